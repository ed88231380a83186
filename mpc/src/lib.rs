use std::ops::{Add, Neg, Sub};

use async_trait::async_trait;

pub mod circuits;
pub mod executor;
pub mod fields;
pub mod kernels;
pub mod plaintext;
pub mod spdz;
pub mod transport;

pub use ff;
pub use fields::MpcField;

/// Private share of a field element.
/// Sharing is linear and supports multiplication by plaintext field elements without communication.
pub trait MpcShare:
    Copy + Clone + Send + Sync + 'static + Add<Output = Self> + Sub<Output = Self> + Neg<Output = Self>
{
    /// Field type of value represented by this share.
    type Field: MpcField;

    /// Sharing of zero.
    fn zero() -> Self;

    /// Multiply share by plaintext field element.
    fn scale(self, rhs: Self::Field) -> Self;

    /// Multiply share by two.
    fn double(&self) -> Self;
}

/// Sharing-based MPC computation context.
pub trait MpcContext {
    /// Field type used by this MPC protocol.
    type Field: MpcField;

    /// Share type used by this MPC protocol.
    type Share: MpcShare<Field = Self::Field>;

    /// Number of parties participating in MPC computation.
    fn num_parties(&self) -> usize;

    /// ID of current party.
    fn party_id(&self) -> usize;
}

/// Dealer of precomputed parameters for MPC computation.
pub trait MpcDealer: MpcContext {
    /// Sharing of a public value. Requires no communication.
    fn share_plain(&self, x: Self::Field) -> Self::Share;

    /// Random sharing of a secret random triple (a, b, c) that satisfies ab = c.
    fn next_beaver_triple(&mut self) -> (Self::Share, Self::Share, Self::Share);

    /// Random sharing of a secret uniformly random unsigned integer with given number of bits.
    fn next_uint(&mut self, bits: usize) -> Self::Share;
}

/// Low-level interface of sharing-based MPC protocol.
#[async_trait]
pub trait MpcEngine: MpcContext {
    type Dealer: MpcDealer<Field = Self::Field, Share = Self::Share>;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get dealer associated with this computation.
    fn dealer(&mut self) -> &mut Self::Dealer;

    /// Share inputs of every party. Each party provides its own (possibly empty) input list,
    /// result contains shares of inputs of all parties indexed by party ID.
    async fn process_inputs(
        &mut self,
        inputs: Vec<Self::Field>,
    ) -> Result<Vec<Vec<Self::Share>>, Self::Error>;

    /// Open bundle of shares without verifying their integrity.
    async fn process_openings_unchecked(
        &mut self,
        requests: Vec<Self::Share>,
    ) -> Result<Vec<Self::Field>, Self::Error>;

    /// Verify integrity of all values opened since the last check.
    async fn check_integrity(&mut self) -> Result<(), Self::Error>;
}
