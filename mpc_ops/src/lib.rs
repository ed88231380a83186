//! Arithmetic operators over private, public and secret-shared tensors.

pub mod binary;
pub mod compute;
pub mod config;
pub mod error;
pub mod exec_node;
pub mod harness;
pub mod operator;
pub mod registry;
pub mod runner;
pub mod session;
pub mod tensor;
pub mod verify;

pub use error::OpError;
pub use operator::Operator;
pub use registry::get_operator;
pub use runner::OpAsyncRunner;
pub use tensor::{DataType, Tensor};
