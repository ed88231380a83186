use std::{future::Future, task::Poll};

use futures::future::{maybe_done, poll_fn};

mod bits;
mod elementary;
mod integer;
mod sequences;

pub use bits::*;
pub use elementary::*;
pub use integer::*;
pub use sequences::*;

pub use futures; // Reexport futures crate for join_circuits! macro.

/// Wait on multiple concurrent branches, returning when **all** branches complete.
/// This macro guarantees deterministic polling order of provided futures,
/// which makes it safe to use with our async circuits.
#[macro_export]
macro_rules! join_circuits {
    // TODO: Currently we rely on the fact that futures::join! polls futures in the same order each time.
    // This is undocumented, so we shouldn't rely on this.
    ($($tokens:tt)*) => {{
        $crate::circuits::futures::join!($( $tokens )*)
    }}
}

/// Wait on a sequence of concurrent branches, returning outputs in the original order.
/// Unfinished branches are polled in sequence order on every wake-up.
pub async fn join_circuits_all<F: Future>(iter: impl IntoIterator<Item = F>) -> Vec<F::Output> {
    let mut elems: Vec<_> = iter.into_iter().map(|f| Box::pin(maybe_done(f))).collect();

    poll_fn(move |cx| {
        let mut all_done = true;
        for elem in elems.iter_mut() {
            if elem.as_mut().poll(cx).is_pending() {
                all_done = false;
            }
        }

        if all_done {
            Poll::Ready(
                elems
                    .iter_mut()
                    .map(|elem| elem.as_mut().take_output().expect("Output taken twice"))
                    .collect(),
            )
        } else {
            Poll::Pending
        }
    })
    .await
}

#[cfg(test)]
pub mod testing {
    use futures::future::LocalBoxFuture;

    use crate::{executor::MpcExecutionContext, fields::Mersenne127, plaintext::MockMpcEngine};

    pub type MockField = Mersenne127;
    pub type MockContext = MpcExecutionContext<MockMpcEngine<MockField>>;

    /// Run circuit on a single node, computing everything in plain.
    pub async fn test_circuit<F>(circuit: F)
    where
        F: for<'a> FnOnce(&'a MockContext) -> LocalBoxFuture<'a, ()>,
    {
        let ctx = MpcExecutionContext::new(MockMpcEngine::new());
        ctx.run(circuit).await.unwrap();
    }
}
