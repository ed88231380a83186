use async_trait::async_trait;

use crate::{error::OpError, session::ExecContext};

/// Operator of execution plan. Reads inputs named by the node from the session
/// tensor table and stores its outputs there.
#[async_trait(?Send)]
pub trait Operator: Send {
    /// Operator type name, as used by exec nodes.
    fn op_type(&self) -> &'static str;

    /// Execute operator on given node. Secure execution requires every party to run
    /// the same node concurrently.
    async fn run(&self, ctx: &mut ExecContext) -> Result<(), OpError>;
}
