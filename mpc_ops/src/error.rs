use mpc::{executor::MpcExecutionError, kernels::NumericError, spdz::SpdzError};
use thiserror::Error;

use crate::{compute::ComputeError, tensor::DataType};

/// Failure of operator execution or session management.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{op_type}: caught error while invoking {function} function: {source}")]
    Kernel {
        op_type: &'static str,
        function: &'static str,
        #[source]
        source: ComputeError,
    },
    #[error("{op_type} is not implemented")]
    Unimplemented { op_type: &'static str },
    #[error(transparent)]
    Protocol(#[from] MpcExecutionError<SpdzError>),
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error("{op_type}: tensor {name} has unsupported data type {dtype}")]
    InvalidDataType {
        op_type: &'static str,
        name: String,
        dtype: DataType,
    },
    #[error("Data type {0} cannot be secret-shared")]
    UnsupportedSecretType(DataType),
    #[error("Invalid exec node: {0}")]
    InvalidNode(String),
    #[error("Unsupported tensor statuses: {0}")]
    UnsupportedStatus(String),
    #[error("Tensor {0} not found")]
    TensorNotFound(String),
    #[error("Parties revealed different values of {0}")]
    RevealMismatch(String),
    #[error("Unknown operator type {0}")]
    UnknownOperator(String),
    #[error("Party {0} panicked")]
    PartyPanicked(usize),
    #[error("Runtime failure: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Runner is already started")]
    AlreadyStarted,
    #[error("Runner was not started")]
    NotStarted,
}
