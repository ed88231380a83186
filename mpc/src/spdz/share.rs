use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{fields::MpcField, MpcShare};

/// Additive share of a value in SPDZ protocol, paired with additive share of its MAC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(bound = "T: MpcField")]
pub struct SpdzShare<T> {
    pub(super) value: T,
    pub(super) mac: T,
}

impl<T: MpcField> SpdzShare<T> {
    /// Sharing of public value. Party 0 holds the value, every party holds MAC share
    /// computed from its share of the authentication key.
    pub fn from_plain(x: T, auth_key_share: T, party_id: usize) -> Self {
        Self {
            value: if party_id == 0 { x } else { T::zero() },
            mac: x * auth_key_share,
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    fn map(self, f: impl Fn(T) -> T) -> Self {
        Self {
            value: f(self.value),
            mac: f(self.mac),
        }
    }

    fn zip_with(self, rhs: Self, f: impl Fn(T, T) -> T) -> Self {
        Self {
            value: f(self.value, rhs.value),
            mac: f(self.mac, rhs.mac),
        }
    }
}

impl<T: MpcField> MpcShare for SpdzShare<T> {
    type Field = T;

    fn zero() -> Self {
        Self {
            value: T::zero(),
            mac: T::zero(),
        }
    }

    fn scale(self, rhs: T) -> Self {
        self.map(|x| x * rhs)
    }

    fn double(&self) -> Self {
        self.map(|x| x.double())
    }
}

impl<T: MpcField> Add for SpdzShare<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl<T: MpcField> Sub for SpdzShare<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl<T: MpcField> Neg for SpdzShare<T> {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|x| -x)
    }
}
