use ff::Field;

use crate::{executor::MpcExecutionContext, join_circuits, MpcDealer, MpcEngine, MpcShare};

use super::{fold_tree, mul};

/// Share of bit value embedded in a prime field.
#[derive(Copy, Clone, Debug)]
pub struct BitShare<T>(T);

impl<T: MpcShare> BitShare<T> {
    /// Wrap raw share. Input is assumed to be a sharing of a single bit.
    pub fn wrap(raw: T) -> Self {
        Self(raw)
    }

    pub fn plain<E>(ctx: &MpcExecutionContext<E>, value: bool) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        Self::wrap(if value { ctx.one() } else { T::zero() })
    }

    /// Sharing of random bit provided by dealer.
    pub fn random<E>(ctx: &MpcExecutionContext<E>) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        Self::wrap(ctx.with_dealer(|dealer| dealer.next_uint(1)))
    }

    pub fn raw(self) -> T {
        self.0
    }

    /// Open share. Requires communication, integrity is verified when the circuit completes.
    pub async fn open_unchecked<E>(self, ctx: &MpcExecutionContext<E>) -> bool
    where
        E: MpcEngine<Share = T>,
    {
        ctx.open_unchecked(self.0).await != E::Field::zero()
    }

    pub fn not<E>(self, ctx: &MpcExecutionContext<E>) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        Self::wrap(ctx.one() - self.0)
    }

    pub async fn xor<E>(self, ctx: &MpcExecutionContext<E>, rhs: Self) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        let both = mul(ctx, self.0, rhs.0).await;
        Self::wrap(self.0 + rhs.0 - both.double())
    }

    /// Oblivious choice between two shares.
    pub async fn select<E>(self, ctx: &MpcExecutionContext<E>, if_set: T, if_unset: T) -> T
    where
        E: MpcEngine<Share = T>,
    {
        if_unset + mul(ctx, if_set - if_unset, self.0).await
    }
}

/// Sharings of `k` random bits provided by dealer, least significant first.
pub fn random_bits<E: MpcEngine>(ctx: &MpcExecutionContext<E>, k: usize) -> Vec<BitShare<E::Share>> {
    (0..k).map(|_| BitShare::random(ctx)).collect()
}

/// Sharing of integer with given bits, least significant first.
pub fn compose_bits<T: MpcShare>(bits: &[BitShare<T>]) -> T {
    bits.iter()
        .rev()
        .fold(T::zero(), |acc, bit| acc.double() + bit.raw())
}

/// Test whether public integer is less than a secret one given by sharings of its bits,
/// least significant first. Bits of the public integer above `bits.len()` are ignored.
/// Cost: ceil(log_2(bits)) rounds.
pub async fn public_less_than<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    public: u128,
    bits: &[BitShare<E::Share>],
) -> BitShare<E::Share> {
    // Every bit position yields a pair of sharings ([public < secret], [public == secret]),
    // restricted to that position. Pairs of adjacent ranges merge with the higher range deciding
    // unless it is equal.
    let positions = bits.iter().enumerate().map(|(i, bit)| {
        if (public >> i) & 1 == 1 {
            (E::Share::zero(), bit.raw())
        } else {
            (bit.raw(), bit.not(ctx).raw())
        }
    });

    let (less, _) = fold_tree(positions, (E::Share::zero(), ctx.one()), |low, high| async move {
        let (low_less, both_equal) =
            join_circuits!(mul(ctx, high.1, low.0), mul(ctx, high.1, low.1));
        (high.0 + low_less, both_equal)
    })
    .await;

    BitShare::wrap(less)
}
