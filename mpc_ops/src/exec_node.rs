use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::tensor::DataType;

/// Visibility of a tensor across parties.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorStatus {
    /// Known to every party.
    Public,
    /// Known to a single party.
    Private,
    /// Secret-shared between all parties.
    Secret,
}

impl fmt::Display for TensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for TensorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(TensorStatus::Public),
            "private" => Ok(TensorStatus::Private),
            "secret" => Ok(TensorStatus::Secret),
            _ => Err(format!("Unknown tensor status: {}", s)),
        }
    }
}

/// Named reference to a tensor in session tensor table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TensorRef {
    pub name: String,
    pub dtype: DataType,
    pub status: TensorStatus,
}

impl TensorRef {
    pub fn new(name: impl Into<String>, dtype: DataType, status: TensorStatus) -> Self {
        Self {
            name: name.into(),
            dtype,
            status,
        }
    }
}

/// Plan node: operator type with named input and output slots.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecNode {
    pub node_name: String,
    pub op_type: String,
    pub inputs: BTreeMap<String, Vec<TensorRef>>,
    pub outputs: BTreeMap<String, Vec<TensorRef>>,
}

impl ExecNode {
    /// References of given input slot, empty if slot is missing.
    pub fn input(&self, slot: &str) -> &[TensorRef] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// References of given output slot, empty if slot is missing.
    pub fn output(&self, slot: &str) -> &[TensorRef] {
        self.outputs.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Builder of exec nodes.
pub struct ExecNodeBuilder {
    node: ExecNode,
}

impl ExecNodeBuilder {
    pub fn new(op_type: impl Into<String>) -> Self {
        let op_type = op_type.into();
        Self {
            node: ExecNode {
                node_name: op_type.clone(),
                op_type,
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
            },
        }
    }

    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node.node_name = name.into();
        self
    }

    pub fn add_input(mut self, slot: impl Into<String>, refs: Vec<TensorRef>) -> Self {
        self.node.inputs.entry(slot.into()).or_default().extend(refs);
        self
    }

    pub fn add_output(mut self, slot: impl Into<String>, refs: Vec<TensorRef>) -> Self {
        self.node.outputs.entry(slot.into()).or_default().extend(refs);
        self
    }

    pub fn build(self) -> ExecNode {
        self.node
    }
}
