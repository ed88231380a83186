use std::{
    iter,
    ops::{Add, Mul, Neg, Sub},
};

use itertools::Itertools;

use crate::{executor::MpcExecutionContext, MpcDealer, MpcEngine, MpcField, MpcShare};

use super::{compose_bits, join_circuits_all, mul, public_less_than, random_bits, BitShare};

/// Share of signed integer of at most N bits, embedded in a prime field.
/// Valid values satisfy |x| < 2^(N-1), so every value can be negated.
#[derive(Copy, Clone, Debug)]
pub struct IntShare<T, const N: usize>(T);

impl<T: MpcShare, const N: usize> IntShare<T, N> {
    /// Wrap raw share. Input is assumed to be a sharing of a valid N-bit integer.
    pub fn wrap(raw: T) -> Self {
        Self(raw)
    }

    /// Sharing of public value. Panics if value is out of range.
    pub fn plain<E>(ctx: &MpcExecutionContext<E>, value: i128) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        Self::wrap(ctx.plain(embed_int_into_field::<_, N>(value)))
    }

    pub fn zero() -> Self {
        Self::wrap(T::zero())
    }

    pub fn raw(self) -> T {
        self.0
    }

    /// Open share. Integrity is verified when the circuit completes.
    pub async fn open_unchecked<E>(self, ctx: &MpcExecutionContext<E>) -> i128
    where
        E: MpcEngine<Share = T>,
    {
        let offset = E::Field::power_of_two(N - 1);
        let shifted = (ctx.open_unchecked(self.0).await + offset).truncated();
        shifted.wrapping_sub(1 << (N - 1)) as i128
    }

    /// Product of two integers. Result must be a valid N-bit integer.
    pub async fn mul<E>(self, ctx: &MpcExecutionContext<E>, rhs: Self) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        Self::wrap(mul(ctx, self.0, rhs.0).await)
    }

    /// Euclidean remainder modulo 2^k for k < N, in range [0;2^k).
    /// Privacy is statistical with (Field::SAFE_BITS - N) bits of slack.
    /// Cost: 1 + ceil(log_2(k)) rounds.
    pub async fn rem_power_of_two<E>(self, ctx: &MpcExecutionContext<E>, k: usize) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        assert!(k < N, "Remainder modulo 2^{} of {}-bit integer", k, N);

        // Shift into non-negative range, hide behind a random mask with known low bits,
        // then subtract low bits of the mask from low bits of the opened value.
        // Borrow from bit k happens exactly when opened low part is below mask low part.
        let mask = BitMask::random(ctx, k);
        let shifted = self.0 + ctx.plain(E::Field::power_of_two(N - 1));
        let opened = ctx.open_unchecked(shifted + mask.full).await.truncated() % (1 << k);

        let borrow = public_less_than(ctx, opened, &mask.bits).await;
        let borrow = borrow.raw().scale(T::Field::power_of_two(k));
        Self::wrap(ctx.plain(E::Field::from_u128(opened)) - mask.low + borrow)
    }

    /// Floor division by 2^k. Powers at or above N - 1 saturate to the sign.
    pub async fn floor_div_power_of_two<E>(self, ctx: &MpcExecutionContext<E>, k: usize) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        let k = k.min(N - 1);
        let rem = self.rem_power_of_two(ctx, k).await;
        Self::wrap((self.0 - rem.0).scale(T::Field::power_of_two_inverse(k)))
    }

    /// Bits of non-negative value below 2^k, least significant first. Requires k < N.
    /// Remainders modulo every power of two are computed concurrently, so the cost
    /// is that of a single remainder.
    pub async fn to_bits<E>(self, ctx: &MpcExecutionContext<E>, k: usize) -> Vec<BitShare<T>>
    where
        E: MpcEngine<Share = T>,
    {
        if k == 0 {
            return Vec::new();
        }

        let rems = join_circuits_all((1..k).map(|i| self.rem_power_of_two(ctx, i))).await;
        iter::once(T::zero())
            .chain(rems.into_iter().map(Self::raw))
            .chain(iter::once(self.0))
            .tuple_windows()
            .enumerate()
            .map(|(i, (low, high))| {
                BitShare::wrap((high - low).scale(T::Field::power_of_two_inverse(i)))
            })
            .collect()
    }

    /// Sign bit: set iff value is negative.
    pub async fn is_negative<E>(self, ctx: &MpcExecutionContext<E>) -> BitShare<T>
    where
        E: MpcEngine<Share = T>,
    {
        // floor(x / 2^(N-1)) is -1 for negative values and 0 otherwise.
        let sign = self.floor_div_power_of_two(ctx, N - 1).await;
        BitShare::wrap(-sign.0)
    }

    /// Sign bit and magnitude.
    pub async fn sign_and_magnitude<E>(self, ctx: &MpcExecutionContext<E>) -> (BitShare<T>, Self)
    where
        E: MpcEngine<Share = T>,
    {
        let negative = self.is_negative(ctx).await;
        let magnitude = negative.select(ctx, -self.0, self.0).await;
        (negative, Self::wrap(magnitude))
    }
}

impl<T: MpcShare, const N: usize> From<BitShare<T>> for IntShare<T, N> {
    fn from(bit: BitShare<T>) -> Self {
        Self::wrap(bit.raw())
    }
}

impl<T: MpcShare, const N: usize> Add for IntShare<T, N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::wrap(self.0 + rhs.0)
    }
}

impl<T: MpcShare, const N: usize> Sub for IntShare<T, N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::wrap(self.0 - rhs.0)
    }
}

impl<T: MpcShare, const N: usize> Neg for IntShare<T, N> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::wrap(-self.0)
    }
}

impl<T: MpcShare, const N: usize> Mul<i128> for IntShare<T, N> {
    type Output = Self;

    fn mul(self, rhs: i128) -> Self {
        Self::wrap(self.0.scale(embed_int_into_field::<_, N>(rhs)))
    }
}

/// Map signed integer with |value| < 2^(N-1) to field element, negatives wrapping around the modulus.
/// Panics if value is out of range.
pub fn embed_int_into_field<T: MpcField, const N: usize>(value: i128) -> T {
    let magnitude = value.unsigned_abs();
    assert!(
        N >= 128 || magnitude < 1 << (N - 1),
        "Value {} does not fit into {} bits",
        value,
        N
    );
    let elem = T::from_u128(magnitude);
    if value < 0 {
        -elem
    } else {
        elem
    }
}

/// Random mask R of Field::SAFE_BITS bits together with R mod 2^k and the k low bits.
/// Known as PRandM in "Improved Primitives for Secure Multiparty Integer Computation".
struct BitMask<T> {
    full: T,
    low: T,
    bits: Vec<BitShare<T>>,
}

impl<T: MpcShare> BitMask<T> {
    fn random<E>(ctx: &MpcExecutionContext<E>, k: usize) -> Self
    where
        E: MpcEngine<Share = T>,
    {
        let high = ctx.with_dealer(|dealer| dealer.next_uint(E::Field::SAFE_BITS - k));
        let bits = random_bits(ctx, k);
        let low = compose_bits(&bits);
        Self {
            full: high.scale(T::Field::power_of_two(k)) + low,
            low,
            bits,
        }
    }
}
