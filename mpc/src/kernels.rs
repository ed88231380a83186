//! Numeric kernels over secret-shared integer and fixed-point vectors.
//!
//! Every element is an [`IntShare`] with [`VALUE_BITS`] bits. Fixed-point values carry
//! [`FRACTION_BITS`] fractional bits. Encoded values fit into [`RAW_BITS`] signed bits, which
//! leaves room in the embedding for sums, for products of moderate values and for fixed-point
//! promotion of any 64-bit integer. Results outside the embedding are not detected.

use std::iter;

use thiserror::Error;

use crate::{
    circuits::{embed_int_into_field, join_circuits_all, BitShare, IntShare},
    executor::{MpcExecutionContext, MpcExecutionError},
    join_circuits, MpcContext, MpcEngine, MpcShare,
};

/// Bit width of embedded signed integers.
pub const VALUE_BITS: usize = 88;

/// Number of fractional bits of fixed-point values.
pub const FRACTION_BITS: usize = 16;

/// Signed width of encoded values. Covers every 64-bit integer.
pub const RAW_BITS: usize = 64;

/// Plaintext reals must be strictly less than 2^REAL_MAGNITUDE_BITS in absolute value.
pub const REAL_MAGNITUDE_BITS: usize = RAW_BITS - 1 - FRACTION_BITS;

/// Numerator width of integer division.
pub const INT_QUOTIENT_BITS: usize = RAW_BITS;

/// Numerator width of fixed-point division, wide enough for promoted 64-bit integers.
pub const FXP_QUOTIENT_BITS: usize = RAW_BITS + FRACTION_BITS;

/// Shared element of a secret vector.
pub type Value<S> = IntShare<S, VALUE_BITS>;

/// Error in numeric kernel arguments.
#[derive(Debug, Error, PartialEq)]
pub enum NumericError {
    #[error("Operand lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("Real {0} is out of supported range")]
    RealOutOfRange(f64),
    #[error("Revealed value {0} does not fit into 64-bit integer")]
    RevealedOutOfRange(i128),
}

/// Element type of secret value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SecretDType {
    /// Signed integer.
    Int,
    /// Fixed-point real with FRACTION_BITS fractional bits.
    Fxp,
}

/// Secret-shared vector held by a single party.
#[derive(Clone, Debug)]
pub struct SecretValue<S> {
    pub dtype: SecretDType,
    pub elems: Vec<Value<S>>,
}

impl<S: MpcShare> SecretValue<S> {
    /// Lift public raw values into sharing. Requires no communication.
    pub fn from_public<E>(ctx: &MpcExecutionContext<E>, dtype: SecretDType, raw: &[i128]) -> Self
    where
        E: MpcEngine<Share = S>,
    {
        Self {
            dtype,
            elems: raw.iter().map(|&x| Value::plain(ctx, x)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

/// Encode plaintext integer as raw integer value.
pub fn encode_int(value: i64) -> i128 {
    value.into()
}

/// Encode plaintext real as raw fixed-point value, rounding to nearest.
pub fn encode_real(value: f64) -> Result<i128, NumericError> {
    if !value.is_finite() || value.abs() >= (1u64 << REAL_MAGNITUDE_BITS) as f64 {
        return Err(NumericError::RealOutOfRange(value));
    }
    Ok((value * (1u64 << FRACTION_BITS) as f64).round() as i128)
}

/// Decode raw integer value.
pub fn decode_int(raw: i128) -> Result<i64, NumericError> {
    i64::try_from(raw).map_err(|_| NumericError::RevealedOutOfRange(raw))
}

/// Decode raw fixed-point value.
pub fn decode_real(raw: i128) -> f64 {
    raw as f64 / (1u64 << FRACTION_BITS) as f64
}

/// Share raw values owned by a single party. Other parties provide empty input.
/// Must not be called while a circuit is running.
pub async fn input<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    owner: usize,
    dtype: SecretDType,
    own_raw: &[i128],
) -> Result<SecretValue<E::Share>, MpcExecutionError<E::Error>> {
    let own_input = if ctx.party_id() == owner {
        own_raw
            .iter()
            .map(|&x| embed_int_into_field::<_, VALUE_BITS>(x))
            .collect()
    } else {
        Vec::new()
    };

    let mut shares = ctx.input(own_input).await?;
    let elems = if owner < shares.len() {
        shares.swap_remove(owner)
    } else {
        Vec::new()
    };

    Ok(SecretValue {
        dtype,
        elems: elems.into_iter().map(Value::wrap).collect(),
    })
}

/// Open all elements of secret value, returning raw values.
pub async fn reveal<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    value: &SecretValue<E::Share>,
) -> Vec<i128> {
    join_circuits_all(value.elems.iter().map(|x| x.open_unchecked(ctx))).await
}

/// Convert secret value to given element type. Conversion to integer rounds towards negative infinity.
pub async fn dtype_cast<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    value: &SecretValue<E::Share>,
    dtype: SecretDType,
) -> SecretValue<E::Share> {
    let elems = match (value.dtype, dtype) {
        (SecretDType::Int, SecretDType::Fxp) => value
            .elems
            .iter()
            .map(|&x| x * (1 << FRACTION_BITS))
            .collect(),
        (SecretDType::Fxp, SecretDType::Int) => {
            join_circuits_all(
                value
                    .elems
                    .iter()
                    .map(|x| x.floor_div_power_of_two(ctx, FRACTION_BITS)),
            )
            .await
        }
        _ => value.elems.clone(),
    };
    SecretValue { dtype, elems }
}

/// Element-wise sum. Integer operand is promoted when the other one is fixed-point.
pub async fn add<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    lhs: &SecretValue<E::Share>,
    rhs: &SecretValue<E::Share>,
) -> Result<SecretValue<E::Share>, NumericError> {
    check_lengths(lhs, rhs)?;
    let (lhs, rhs) = promote(ctx, lhs, rhs).await;
    Ok(SecretValue {
        dtype: lhs.dtype,
        elems: lhs.elems.iter().zip(&rhs.elems).map(|(&a, &b)| a + b).collect(),
    })
}

/// Element-wise difference. Integer operand is promoted when the other one is fixed-point.
pub async fn sub<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    lhs: &SecretValue<E::Share>,
    rhs: &SecretValue<E::Share>,
) -> Result<SecretValue<E::Share>, NumericError> {
    check_lengths(lhs, rhs)?;
    let (lhs, rhs) = promote(ctx, lhs, rhs).await;
    Ok(SecretValue {
        dtype: lhs.dtype,
        elems: lhs.elems.iter().zip(&rhs.elems).map(|(&a, &b)| a - b).collect(),
    })
}

/// Element-wise product. Product of two fixed-point values is truncated towards negative infinity.
pub async fn mul<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    lhs: &SecretValue<E::Share>,
    rhs: &SecretValue<E::Share>,
) -> Result<SecretValue<E::Share>, NumericError> {
    check_lengths(lhs, rhs)?;

    // Integer times fixed-point is already scaled correctly.
    let truncate = lhs.dtype == SecretDType::Fxp && rhs.dtype == SecretDType::Fxp;
    let dtype = if lhs.dtype == SecretDType::Int && rhs.dtype == SecretDType::Int {
        SecretDType::Int
    } else {
        SecretDType::Fxp
    };

    let elems = join_circuits_all(lhs.elems.iter().zip(&rhs.elems).map(|(&a, &b)| async move {
        let product = a.mul(ctx, b).await;
        if truncate {
            product.floor_div_power_of_two(ctx, FRACTION_BITS).await
        } else {
            product
        }
    }))
    .await;

    Ok(SecretValue { dtype, elems })
}

/// Element-wise quotient, truncated towards zero.
/// Two integers give an integer quotient, otherwise the result is fixed-point.
/// Integer numerators must fit into 64 bits, fixed-point ones must not exceed promoted 64-bit integers.
/// Division by zero gives an unspecified value.
pub async fn div<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    lhs: &SecretValue<E::Share>,
    rhs: &SecretValue<E::Share>,
) -> Result<SecretValue<E::Share>, NumericError> {
    check_lengths(lhs, rhs)?;

    if lhs.dtype == SecretDType::Int && rhs.dtype == SecretDType::Int {
        let elems = join_circuits_all(
            lhs.elems
                .iter()
                .zip(&rhs.elems)
                .map(|(&a, &b)| signed_div(ctx, a, b, INT_QUOTIENT_BITS, 0)),
        )
        .await;
        return Ok(SecretValue {
            dtype: SecretDType::Int,
            elems,
        });
    }

    let (lhs, rhs) = promote(ctx, lhs, rhs).await;
    let elems = join_circuits_all(
        lhs.elems
            .iter()
            .zip(&rhs.elems)
            .map(|(&a, &b)| signed_div(ctx, a, b, FXP_QUOTIENT_BITS, FRACTION_BITS)),
    )
    .await;

    Ok(SecretValue {
        dtype: SecretDType::Fxp,
        elems,
    })
}

fn check_lengths<S>(lhs: &SecretValue<S>, rhs: &SecretValue<S>) -> Result<(), NumericError> {
    if lhs.elems.len() != rhs.elems.len() {
        return Err(NumericError::LengthMismatch {
            left: lhs.elems.len(),
            right: rhs.elems.len(),
        });
    }
    Ok(())
}

/// Bring both operands to a common element type.
async fn promote<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    lhs: &SecretValue<E::Share>,
    rhs: &SecretValue<E::Share>,
) -> (SecretValue<E::Share>, SecretValue<E::Share>) {
    if lhs.dtype == rhs.dtype {
        return (lhs.clone(), rhs.clone());
    }
    join_circuits!(
        dtype_cast(ctx, lhs, SecretDType::Fxp),
        dtype_cast(ctx, rhs, SecretDType::Fxp)
    )
}

/// Long division of |num| * 2^extra_bits by |den|, with the sign applied afterwards.
/// |num| must fit into `num_bits` bits. The partial remainder stays below |den|,
/// so no intermediate grows beyond twice the denominator.
async fn signed_div<E: MpcEngine>(
    ctx: &MpcExecutionContext<E>,
    num: Value<E::Share>,
    den: Value<E::Share>,
    num_bits: usize,
    extra_bits: usize,
) -> Value<E::Share> {
    let ((num_negative, num_abs), (den_negative, den_abs)) =
        join_circuits!(num.sign_and_magnitude(ctx), den.sign_and_magnitude(ctx));
    let (negative, num_digits) = join_circuits!(
        num_negative.xor(ctx, den_negative),
        num_abs.to_bits(ctx, num_bits)
    );

    let digits = num_digits
        .into_iter()
        .rev()
        .map(Value::from)
        .chain(iter::repeat(Value::zero()).take(extra_bits));

    let mut remainder = Value::zero();
    let mut quotient = Value::zero();
    for digit in digits {
        let shifted = remainder * 2 + digit;
        let trial = shifted - den_abs;
        let fits: BitShare<_> = trial.is_negative(ctx).await.not(ctx);
        remainder = Value::wrap(fits.select(ctx, trial.raw(), shifted.raw()).await);
        quotient = quotient * 2 + Value::from(fits);
    }

    Value::wrap(negative.select(ctx, (-quotient).raw(), quotient.raw()).await)
}
