use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use crate::{error::OpError, session::ExecContext, tensor::Tensor};

/// Default tolerance of real comparisons.
pub const DEFAULT_ATOL: f64 = 1e-5;

/// Tolerance of comparisons involving revealed fixed-point values.
pub const SECRET_ATOL: f64 = 0.05;

/// Actual tensor differs from expectation.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("expect type = {expected_type}, got type = {actual_type}\nexpect result = {expected}\nbut actual got result = {actual}")]
pub struct VerificationMismatch {
    pub expected_type: String,
    pub actual_type: String,
    pub expected: String,
    pub actual: String,
}

/// Open named secret in all sessions and reconstruct plaintext tensor.
/// Must not be called from async code.
pub fn reveal_secret(ctxs: &[ExecContext], name: &str) -> Result<Tensor, OpError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let revealed = runtime.block_on(try_join_all(
        ctxs.iter().map(|ctx| ctx.session().reveal(name)),
    ))?;
    debug!(name, parties = revealed.len(), "Revealed secret");

    let mut revealed = revealed.into_iter();
    let first = revealed
        .next()
        .ok_or_else(|| OpError::TensorNotFound(name.into()))?;
    if revealed.any(|other| other != first) {
        return Err(OpError::RevealMismatch(name.into()));
    }
    Ok(first)
}

/// Compare tensors. Integers must be equal, reals may differ by `atol`.
pub fn expect_tensor_eq(
    expected: &Tensor,
    actual: &Tensor,
    atol: Option<f64>,
) -> Result<(), VerificationMismatch> {
    let atol = atol.unwrap_or(DEFAULT_ATOL);
    let equal = match (expected, actual) {
        (Tensor::Float64(a), Tensor::Float64(b)) => {
            a.len() == b.len()
                && a.iter().zip(b).all(|(&x, &y)| {
                    (x.is_nan() && y.is_nan()) || x == y || (x - y).abs() <= atol
                })
        }
        _ => expected == actual,
    };

    if equal {
        Ok(())
    } else {
        Err(VerificationMismatch {
            expected_type: expected.dtype().to_string(),
            actual_type: actual.dtype().to_string(),
            expected: expected.to_json(),
            actual: actual.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_tensor_eq() {
        let ints = Tensor::from(vec![1i64, 2]);
        assert!(expect_tensor_eq(&ints, &Tensor::from(vec![1i64, 2]), None).is_ok());
        assert!(expect_tensor_eq(&ints, &Tensor::from(vec![1i64, 3]), Some(10.0)).is_err());

        let reals = Tensor::from(vec![0.5, f64::NAN]);
        assert!(expect_tensor_eq(&reals, &Tensor::from(vec![0.52, f64::NAN]), Some(SECRET_ATOL)).is_ok());
        assert!(expect_tensor_eq(&reals, &Tensor::from(vec![0.52, f64::NAN]), None).is_err());
        assert!(expect_tensor_eq(&reals, &Tensor::from(vec![0.5]), Some(1.0)).is_err());
    }

    #[test]
    fn test_mismatch_message() {
        let err = expect_tensor_eq(
            &Tensor::from(vec![0.5, 1.0]),
            &Tensor::from(vec![0i64, 1]),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expect type = double, got type = int64\nexpect result = [0.5,1.0]\nbut actual got result = [0,1]"
        );
    }
}
