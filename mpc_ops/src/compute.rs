//! Vectorized plaintext kernels over tensors.
//!
//! Functions are looked up by name and report failures as status errors, integer arithmetic
//! wraps on overflow and integer division truncates towards zero.

use ndarray::{Array1, Zip};
use thiserror::Error;

use crate::tensor::{DataType, Tensor};

/// Largest integer that is exactly representable as 64-bit float.
const MAX_EXACT_FLOAT_INT: i64 = 1 << 53;

/// Failure status of compute function.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("Invalid: {0}")]
    Invalid(String),
    #[error("NotImplemented: {0}")]
    NotImplemented(String),
    #[error("Key error: No function registered with name: {0}")]
    UnknownFunction(String),
}

/// Binary arithmetic function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Arithmetic {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Arithmetic::Add),
            "subtract" => Some(Arithmetic::Subtract),
            "multiply" => Some(Arithmetic::Multiply),
            "divide" => Some(Arithmetic::Divide),
            _ => None,
        }
    }

    fn apply_int(self, lhs: i64, rhs: i64) -> Result<i64, ComputeError> {
        Ok(match self {
            Arithmetic::Add => lhs.wrapping_add(rhs),
            Arithmetic::Subtract => lhs.wrapping_sub(rhs),
            Arithmetic::Multiply => lhs.wrapping_mul(rhs),
            Arithmetic::Divide => {
                if rhs == 0 {
                    return Err(ComputeError::Invalid("divide by zero".into()));
                }
                lhs.wrapping_div(rhs)
            }
        })
    }

    fn apply_float(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Arithmetic::Add => lhs + rhs,
            Arithmetic::Subtract => lhs - rhs,
            Arithmetic::Multiply => lhs * rhs,
            Arithmetic::Divide => lhs / rhs,
        }
    }
}

/// Invoke compute function by name.
pub fn call_function(name: &str, args: &[&Tensor]) -> Result<Tensor, ComputeError> {
    let function =
        Arithmetic::from_name(name).ok_or_else(|| ComputeError::UnknownFunction(name.into()))?;

    let (lhs, rhs) = match args {
        [lhs, rhs] => (*lhs, *rhs),
        _ => {
            return Err(ComputeError::Invalid(format!(
                "Function '{}' accepts 2 arguments but {} passed",
                name,
                args.len()
            )))
        }
    };

    if lhs.len() != rhs.len() {
        return Err(ComputeError::Invalid(
            "Array arguments must all be the same length".into(),
        ));
    }

    match (lhs, rhs) {
        (Tensor::Int64(a), Tensor::Int64(b)) => {
            let mut result = Vec::with_capacity(a.len());
            for (&x, &y) in a.iter().zip(b) {
                result.push(function.apply_int(x, y)?);
            }
            Ok(Tensor::Int64(result.into()))
        }
        (Tensor::Int64(_) | Tensor::Float64(_), Tensor::Int64(_) | Tensor::Float64(_)) => {
            let a = to_float(lhs)?;
            let b = to_float(rhs)?;
            Ok(Tensor::Float64(
                Zip::from(&a)
                    .and(&b)
                    .map_collect(|&x, &y| function.apply_float(x, y)),
            ))
        }
        _ => Err(ComputeError::NotImplemented(format!(
            "Function '{}' has no kernel matching input types ({}, {})",
            name,
            lhs.dtype(),
            rhs.dtype()
        ))),
    }
}

/// Safe cast: fails instead of losing information.
pub fn cast(tensor: &Tensor, to: DataType) -> Result<Tensor, ComputeError> {
    if tensor.dtype() == to {
        return Ok(tensor.clone());
    }

    match (tensor, to) {
        (Tensor::Int64(_), DataType::Float64) => Ok(Tensor::Float64(to_float(tensor)?)),
        (Tensor::Float64(x), DataType::Int64) => {
            let mut result = Vec::with_capacity(x.len());
            for &value in x {
                if value.fract() != 0.0 || value.abs() > MAX_EXACT_FLOAT_INT as f64 {
                    return Err(ComputeError::Invalid(format!(
                        "Float value {} was truncated converting to int64",
                        value
                    )));
                }
                result.push(value as i64);
            }
            Ok(Tensor::Int64(result.into()))
        }
        (Tensor::Bool(x), DataType::Int64) => Ok(Tensor::Int64(x.mapv(i64::from))),
        (Tensor::Bool(x), DataType::Float64) => {
            Ok(Tensor::Float64(x.mapv(|b| if b { 1.0 } else { 0.0 })))
        }
        _ => Err(ComputeError::NotImplemented(format!(
            "Unsupported cast from {} to {}",
            tensor.dtype(),
            to
        ))),
    }
}

/// Widen numeric tensor to floats, integers must be exactly representable.
fn to_float(tensor: &Tensor) -> Result<Array1<f64>, ComputeError> {
    match tensor {
        Tensor::Float64(x) => Ok(x.clone()),
        Tensor::Int64(x) => {
            if let Some(value) = x.iter().find(|v| v.unsigned_abs() > MAX_EXACT_FLOAT_INT as u64) {
                return Err(ComputeError::Invalid(format!(
                    "Integer value {} not in range: {} to {}",
                    value, -MAX_EXACT_FLOAT_INT, MAX_EXACT_FLOAT_INT
                )));
            }
            Ok(x.mapv(|v| v as f64))
        }
        _ => Err(ComputeError::NotImplemented(format!(
            "Unsupported cast from {} to double",
            tensor.dtype()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        let a = Tensor::from(vec![1, 3, -7, i64::MAX]);
        let b = Tensor::from(vec![2i64, 3, 2, 1]);
        assert_eq!(
            call_function("add", &[&a, &b]).unwrap(),
            Tensor::from(vec![3, 6, -5, i64::MIN])
        );
        assert_eq!(
            call_function("divide", &[&a, &b]).unwrap(),
            Tensor::from(vec![0, 1, -3, i64::MAX])
        );
    }

    #[test]
    fn test_numeric_promotion() {
        let a = Tensor::from(vec![1i64, 2]);
        let b = Tensor::from(vec![0.5, 4.0]);
        assert_eq!(
            call_function("multiply", &[&a, &b]).unwrap(),
            Tensor::from(vec![0.5, 8.0])
        );
        assert_eq!(
            call_function("subtract", &[&b, &a]).unwrap(),
            Tensor::from(vec![-0.5, 2.0])
        );
    }

    #[test]
    fn test_errors() {
        let a = Tensor::from(vec![1i64, 2]);
        let zero = Tensor::from(vec![1i64, 0]);
        let err = call_function("divide", &[&a, &zero]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid: divide by zero");

        let short = Tensor::from(vec![1i64]);
        assert!(matches!(
            call_function("add", &[&a, &short]),
            Err(ComputeError::Invalid(_))
        ));

        let bools = Tensor::from(vec![true, false]);
        assert!(matches!(
            call_function("add", &[&a, &bools]),
            Err(ComputeError::NotImplemented(_))
        ));

        assert_eq!(
            call_function("modulo", &[&a, &a]),
            Err(ComputeError::UnknownFunction("modulo".into()))
        );
    }

    #[test]
    fn test_float_division_by_zero() {
        let a = Tensor::from(vec![1.0, -1.0]);
        let b = Tensor::from(vec![0.0, 0.0]);
        assert_eq!(
            call_function("divide", &[&a, &b]).unwrap(),
            Tensor::from(vec![f64::INFINITY, f64::NEG_INFINITY])
        );
    }

    #[test]
    fn test_safe_cast() {
        let a = Tensor::from(vec![1i64, -3]);
        assert_eq!(
            cast(&a, DataType::Float64).unwrap(),
            Tensor::from(vec![1.0, -3.0])
        );
        assert_eq!(
            cast(&Tensor::from(vec![2.0]), DataType::Int64).unwrap(),
            Tensor::from(vec![2i64])
        );
        assert!(cast(&Tensor::from(vec![2.5]), DataType::Int64).is_err());
        assert!(cast(&Tensor::from(vec![1i64 << 60]), DataType::Float64).is_err());
        assert!(matches!(
            cast(&a, DataType::String),
            Err(ComputeError::NotImplemented(_))
        ));
    }
}
