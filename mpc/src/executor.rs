use std::{
    cell::{Cell, RefCell},
    mem,
    task::Poll,
};

use ff::Field;
use futures::future::LocalBoxFuture;
use thiserror::Error;
use tracing::trace;

use crate::*;

/// Error during execution of MPC circuit.
#[derive(Debug, Error)]
pub enum MpcExecutionError<E> {
    /// Underlying protocol engine failed.
    #[error("MPC engine failure: {0}")]
    Engine(#[source] E),
    /// Circuit suspended without issuing any protocol request, so it can never complete.
    #[error("Circuit stalled without pending protocol requests")]
    Stalled,
}

/// Statistics of MPC circuit execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MpcExecutionStats {
    pub num_openings: usize,
    pub num_rounds: usize,
    pub num_integrity_checks: usize,
}

/// Execution context of async MPC circuits.
/// Openings requested by concurrently running branches of a circuit are batched into a single
/// communication round, so parties must run identical circuits in the same order.
pub struct MpcExecutionContext<E: MpcEngine> {
    engine: RefCell<E>,
    open_buffer: RoundCommandBuffer<E::Share, E::Field>,
    stats: Cell<MpcExecutionStats>,
}

impl<E: MpcEngine> MpcExecutionContext<E> {
    /// Create new execution context on top of MPC engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine: RefCell::new(engine),
            open_buffer: RoundCommandBuffer::new(),
            stats: Cell::new(MpcExecutionStats::default()),
        }
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> MpcExecutionStats {
        self.stats.get()
    }

    /// Run closure with mutable access to dealer of precomputed parameters.
    pub fn with_dealer<R>(&self, f: impl FnOnce(&mut E::Dealer) -> R) -> R {
        f(self.engine.borrow_mut().dealer())
    }

    /// Sharing of a public value.
    pub fn plain(&self, value: E::Field) -> E::Share {
        self.with_dealer(|dealer| dealer.share_plain(value))
    }

    /// Sharing of one.
    pub fn one(&self) -> E::Share {
        self.plain(E::Field::one())
    }

    /// Open provided share. Requires communication.
    /// Integrity of opened values is verified when the enclosing circuit completes.
    pub async fn open_unchecked(&self, share: E::Share) -> E::Field {
        self.stats.set(MpcExecutionStats {
            num_openings: self.stats.get().num_openings + 1,
            ..self.stats.get()
        });
        self.open_buffer.queue(share).await
    }

    /// Share inputs of all parties. Must not be called while a circuit is running.
    #[allow(clippy::await_holding_refcell_ref)]
    pub async fn input(
        &self,
        values: Vec<E::Field>,
    ) -> Result<Vec<Vec<E::Share>>, MpcExecutionError<E::Error>> {
        let mut engine = self.engine.borrow_mut();
        let shares = engine
            .process_inputs(values)
            .await
            .map_err(MpcExecutionError::Engine)?;
        self.bump_rounds();
        Ok(shares)
    }

    /// Execute given async circuit. Values opened by the circuit are verified before returning.
    pub async fn run<'a, T, F>(&'a self, circuit: F) -> Result<T, MpcExecutionError<E::Error>>
    where
        F: FnOnce(&'a Self) -> LocalBoxFuture<'a, T>,
    {
        self.open_buffer.reset();
        let mut future = circuit(self);

        let output = loop {
            if let Poll::Ready(output) = futures::poll!(future.as_mut()) {
                break output;
            }

            let requests = self.open_buffer.take_requests();
            if requests.is_empty() {
                return Err(MpcExecutionError::Stalled);
            }

            trace!(count = requests.len(), "Processing round");
            let responses = self.process_openings(requests).await?;
            self.open_buffer.resolve_all(responses);
        };

        self.ensure_integrity().await?;
        Ok(output)
    }

    /// Verify integrity of all values opened so far.
    #[allow(clippy::await_holding_refcell_ref)]
    pub async fn ensure_integrity(&self) -> Result<(), MpcExecutionError<E::Error>> {
        // The circuit is never polled while the engine is borrowed.
        let mut engine = self.engine.borrow_mut();
        engine
            .check_integrity()
            .await
            .map_err(MpcExecutionError::Engine)?;
        self.stats.set(MpcExecutionStats {
            num_integrity_checks: self.stats.get().num_integrity_checks + 1,
            ..self.stats.get()
        });
        Ok(())
    }

    #[allow(clippy::await_holding_refcell_ref)]
    async fn process_openings(
        &self,
        requests: Vec<E::Share>,
    ) -> Result<Vec<E::Field>, MpcExecutionError<E::Error>> {
        let mut engine = self.engine.borrow_mut();
        let responses = engine
            .process_openings_unchecked(requests)
            .await
            .map_err(MpcExecutionError::Engine)?;
        self.bump_rounds();
        Ok(responses)
    }

    fn bump_rounds(&self) {
        self.stats.set(MpcExecutionStats {
            num_rounds: self.stats.get().num_rounds + 1,
            ..self.stats.get()
        });
    }
}

impl<E: MpcEngine> MpcContext for MpcExecutionContext<E> {
    type Field = E::Field;
    type Share = E::Share;

    fn num_parties(&self) -> usize {
        self.engine.borrow().num_parties()
    }

    fn party_id(&self) -> usize {
        self.engine.borrow().party_id()
    }
}

/// Buffer for accumulating commands issues by async circuit.
struct RoundCommandBuffer<T, S> {
    requests: RefCell<Vec<T>>,
    responses: RefCell<Vec<Option<S>>>,
    round_index: Cell<usize>,
    first_unpolled_response: Cell<usize>,
}

impl<T, S> RoundCommandBuffer<T, S> {
    /// Create new instance.
    fn new() -> Self {
        RoundCommandBuffer {
            requests: RefCell::new(Vec::new()),
            responses: RefCell::new(Vec::new()),
            round_index: Cell::new(0),
            first_unpolled_response: Cell::new(0),
        }
    }

    /// Queue new command and asynchronously wait for response.
    async fn queue(&self, input: T) -> S {
        let index = self.requests.borrow().len();
        let target_round = self.round_index.get() + 1;
        self.requests.borrow_mut().push(input);

        futures::future::poll_fn(|_| {
            if self.round_index.get() == target_round {
                if self.first_unpolled_response.get() != index {
                    panic!("Circuit execution went out of order");
                }
                self.first_unpolled_response.set(index + 1);
                Poll::Ready(
                    self.responses.borrow_mut()[index]
                        .take()
                        .expect("Future polled twice"),
                )
            } else {
                Poll::Pending
            }
        })
        .await
    }

    /// Drop leftovers of an aborted execution.
    fn reset(&self) {
        self.requests.borrow_mut().clear();
        self.responses.borrow_mut().clear();
        self.first_unpolled_response.set(0);
    }

    /// Get requests accumulated during last round.
    fn take_requests(&self) -> Vec<T> {
        mem::take(&mut *self.requests.borrow_mut())
    }

    /// Resolve all requests issued during last round.
    fn resolve_all(&self, new_responses: impl IntoIterator<Item = S>) {
        let mut responses = self.responses.borrow_mut();

        if self.first_unpolled_response.get() != responses.len() {
            panic!("Some responses from previous round were not processed");
        }

        responses.clear();
        responses.extend(new_responses.into_iter().map(Some));
        self.round_index.set(self.round_index.get() + 1);
        self.first_unpolled_response.set(0);
    }
}
