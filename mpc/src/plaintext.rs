use std::{
    convert::Infallible,
    marker::PhantomData,
    ops::{Add, Neg, Sub},
};

use async_trait::async_trait;
use rand::{thread_rng, Rng};

use crate::*;

/// Single-party engine computing everything in plain. Openings echo the shares back,
/// dealer randomness comes from the thread-local generator.
pub struct MockMpcEngine<T>(PhantomData<T>);

impl<T: MpcField> MockMpcEngine<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: MpcField> Default for MockMpcEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MpcField> MpcContext for MockMpcEngine<T> {
    type Field = T;
    type Share = PlainShare<T>;

    fn num_parties(&self) -> usize {
        1
    }

    fn party_id(&self) -> usize {
        0
    }
}

#[async_trait]
impl<T: MpcField> MpcEngine for MockMpcEngine<T> {
    type Dealer = Self;
    type Error = Infallible;

    fn dealer(&mut self) -> &mut Self::Dealer {
        self
    }

    async fn process_inputs(&mut self, inputs: Vec<T>) -> Result<Vec<Vec<PlainShare<T>>>, Infallible> {
        Ok(vec![inputs.into_iter().map(PlainShare).collect()])
    }

    async fn process_openings_unchecked(
        &mut self,
        requests: Vec<PlainShare<T>>,
    ) -> Result<Vec<T>, Infallible> {
        Ok(requests.into_iter().map(|share| share.0).collect())
    }

    async fn check_integrity(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl<T: MpcField> MpcDealer for MockMpcEngine<T> {
    fn share_plain(&self, x: T) -> PlainShare<T> {
        PlainShare(x)
    }

    fn next_beaver_triple(&mut self) -> (PlainShare<T>, PlainShare<T>, PlainShare<T>) {
        let (a, b) = (T::random(thread_rng()), T::random(thread_rng()));
        (PlainShare(a), PlainShare(b), PlainShare(a * b))
    }

    fn next_uint(&mut self, bits: usize) -> PlainShare<T> {
        let value = match bits {
            0 => 0,
            _ => thread_rng().gen::<u128>() >> (128 - bits),
        };
        PlainShare(T::from_u128(value))
    }
}

/// Share of a computation run on a single node, equal to the plaintext value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlainShare<T>(pub T);

impl<T: MpcField> MpcShare for PlainShare<T> {
    type Field = T;

    fn zero() -> Self {
        Self(T::zero())
    }

    fn scale(self, rhs: T) -> Self {
        Self(self.0 * rhs)
    }

    fn double(&self) -> Self {
        Self(self.0.double())
    }
}

impl<T: MpcField> Add for PlainShare<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl<T: MpcField> Sub for PlainShare<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl<T: MpcField> Neg for PlainShare<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}
