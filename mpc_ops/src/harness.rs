//! Helpers that place operator inputs into party sessions.
//!
//! Functions that run protocols create their own runtime and must not be called from async code.

use futures::future::try_join_all;
use tracing::debug;

use crate::{error::OpError, session::ExecContext, tensor::Tensor};

/// Party that owns private inputs and provides secret inputs.
pub const INPUT_OWNER: usize = 0;

/// Tensor together with its name in tensor table.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub tensor: Tensor,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            name: name.into(),
            tensor,
        }
    }
}

/// Store inputs in the session of a single party.
pub fn feed_inputs_as_private(ctx: &mut ExecContext, inputs: &[NamedTensor]) {
    for input in inputs {
        ctx.session_mut()
            .table_mut()
            .add_tensor(input.name.clone(), input.tensor.clone());
    }
}

/// Store inputs in sessions of all parties.
pub fn feed_inputs_as_public(ctxs: &mut [ExecContext], inputs: &[NamedTensor]) {
    for ctx in ctxs {
        feed_inputs_as_private(ctx, inputs);
    }
}

/// Secret-share inputs of the owner party between all sessions.
pub fn feed_inputs_as_secret(ctxs: &mut [ExecContext], inputs: &[NamedTensor]) -> Result<(), OpError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(try_join_all(ctxs.iter_mut().map(|ctx| async move {
        let session = ctx.session_mut();
        for input in inputs {
            let tensor = (session.party_id() == INPUT_OWNER).then(|| &input.tensor);
            session
                .input_secret(&input.name, INPUT_OWNER, input.tensor.dtype(), tensor)
                .await?;
        }
        debug!(party = session.party_id(), count = inputs.len(), "Fed secret inputs");
        Ok::<_, OpError>(())
    })))?;
    Ok(())
}
