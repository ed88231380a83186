//! SPDZ protocol: additive secret sharing with information-theoretic MACs,
//! verified in batches after every circuit.

mod engine;
mod fake_dealer;
mod share;

pub use engine::{SpdzEngine, SpdzError, SpdzMessage};
pub use fake_dealer::FakeSpdzDealer;
pub use share::SpdzShare;

use crate::MpcDealer;

/// Source of preprocessed SPDZ parameters on top of generic dealer.
pub trait SpdzDealer: MpcDealer {
    /// Local additive share of the global MAC key.
    fn authentication_key_share(&self) -> Self::Field;

    /// Next input mask of current party: its sharing and its plaintext.
    fn next_input_mask_own(&mut self) -> (Self::Share, Self::Field);

    /// Sharing of next input mask of party `id`.
    fn next_input_mask_for(&mut self, id: usize) -> Self::Share;
}
