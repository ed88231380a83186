use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::{error::OpError, operator::Operator, session::ExecContext};

/// Runs operator of a single party on a dedicated thread.
///
/// Secure operators block on protocol rounds with other parties, so every party must be started
/// before waiting on any of them. When the run fails, the party session is dropped, which fails
/// pending protocol rounds of other parties instead of blocking them forever.
pub struct OpAsyncRunner {
    op: Option<Box<dyn Operator>>,
    handle: Option<JoinHandle<Result<ExecContext, OpError>>>,
    party_id: usize,
}

impl OpAsyncRunner {
    pub fn new(op: Box<dyn Operator>) -> Self {
        Self {
            op: Some(op),
            handle: None,
            party_id: 0,
        }
    }

    /// Start operator in background. Returns immediately.
    pub fn start(&mut self, mut ctx: ExecContext) -> Result<(), OpError> {
        let op = self.op.take().ok_or(OpError::AlreadyStarted)?;
        let party_id = ctx.session().party_id();
        self.party_id = party_id;

        info!(
            party = party_id,
            op = op.op_type(),
            node = %ctx.node().node_name,
            "Starting operator"
        );
        let handle = thread::Builder::new()
            .name(format!("party-{}", party_id))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                match runtime.block_on(op.run(&mut ctx)) {
                    Ok(()) => {
                        debug!(party = party_id, "Operator finished");
                        Ok(ctx)
                    }
                    Err(err) => {
                        warn!(party = party_id, %err, "Operator failed");
                        Err(err)
                    }
                }
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Block until operator completes, returning context with its outputs.
    pub fn wait(&mut self) -> Result<ExecContext, OpError> {
        let handle = self.handle.take().ok_or(OpError::NotStarted)?;
        handle
            .join()
            .map_err(|_| OpError::PartyPanicked(self.party_id))?
    }
}
