use std::{fmt, str::FromStr};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Element type of a tensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int64,
    Float64,
    Bool,
    String,
}

impl DataType {
    pub fn is_integer(self) -> bool {
        self == DataType::Int64
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "double",
            DataType::Bool => "bool",
            DataType::String => "string",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int64" => Ok(DataType::Int64),
            "float64" | "double" => Ok(DataType::Float64),
            "bool" => Ok(DataType::Bool),
            "string" => Ok(DataType::String),
            _ => Err(format!("Unknown data type: {}", s)),
        }
    }
}

/// Immutable typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
    Int64(Array1<i64>),
    Float64(Array1<f64>),
    Bool(Array1<bool>),
    String(Array1<String>),
}

impl Tensor {
    /// Parse tensor of given type from JSON array.
    pub fn from_json(dtype: DataType, text: &str) -> serde_json::Result<Self> {
        Ok(match dtype {
            DataType::Int64 => Tensor::Int64(serde_json::from_str::<Vec<i64>>(text)?.into()),
            DataType::Float64 => Tensor::Float64(serde_json::from_str::<Vec<f64>>(text)?.into()),
            DataType::Bool => Tensor::Bool(serde_json::from_str::<Vec<bool>>(text)?.into()),
            DataType::String => Tensor::String(serde_json::from_str::<Vec<String>>(text)?.into()),
        })
    }

    /// Serialize elements as JSON array. Non-finite reals are written as nulls.
    pub fn to_json(&self) -> String {
        let value = match self {
            Tensor::Int64(x) => serde_json::json!(x.to_vec()),
            Tensor::Float64(x) => serde_json::json!(x.to_vec()),
            Tensor::Bool(x) => serde_json::json!(x.to_vec()),
            Tensor::String(x) => serde_json::json!(x.to_vec()),
        };
        value.to_string()
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Tensor::Int64(_) => DataType::Int64,
            Tensor::Float64(_) => DataType::Float64,
            Tensor::Bool(_) => DataType::Bool,
            Tensor::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Tensor::Int64(x) => x.len(),
            Tensor::Float64(x) => x.len(),
            Tensor::Bool(x) => x.len(),
            Tensor::String(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<i64>> for Tensor {
    fn from(values: Vec<i64>) -> Self {
        Tensor::Int64(values.into())
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(values: Vec<f64>) -> Self {
        Tensor::Float64(values.into())
    }
}

impl From<Vec<bool>> for Tensor {
    fn from(values: Vec<bool>) -> Self {
        Tensor::Bool(values.into())
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json() {
        let tensor = Tensor::from_json(DataType::Float64, "[1, 2.5, -3]").unwrap();
        assert_eq!(tensor, Tensor::from(vec![1.0, 2.5, -3.0]));
        assert_eq!(tensor.to_json(), "[1.0,2.5,-3.0]");

        let tensor = Tensor::from_json(DataType::String, r#"["a", "b"]"#).unwrap();
        assert_eq!(tensor.dtype(), DataType::String);
        assert_eq!(tensor.len(), 2);

        assert!(Tensor::from_json(DataType::Int64, "[1.5]").is_err());
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!("float64".parse::<DataType>(), Ok(DataType::Float64));
        assert_eq!("Int64".parse::<DataType>(), Ok(DataType::Int64));
        assert!("decimal".parse::<DataType>().is_err());
        assert_eq!(DataType::Float64.to_string(), "double");
    }
}
