use ff::PrimeField;
use serde::{de::DeserializeOwned, Serialize};

/// Prime field suitable for MPC computations over embedded integers.
/// Field representation must be little-endian.
pub trait MpcField: PrimeField + Serialize + DeserializeOwned {
    /// Bit length of random masks used to statistically hide embedded integers.
    /// Sum of a mask and an embedded integer must not overflow the field.
    const SAFE_BITS: usize;

    /// Field element 2^k.
    fn power_of_two(k: usize) -> Self {
        (0..k).fold(Self::one(), |acc, _| acc.double())
    }

    /// Field element 2^-k.
    fn power_of_two_inverse(k: usize) -> Self {
        Option::from(Self::power_of_two(k).invert()).expect("Powers of two are invertible")
    }

    /// Embed unsigned 128-bit integer (reduced modulo field characteristic).
    fn from_u128(value: u128) -> Self {
        Self::from((value >> 64) as u64) * Self::power_of_two(64) + Self::from(value as u64)
    }

    /// Lowest 128 bits of canonical representation.
    fn truncated(&self) -> u128 {
        let repr = self.to_repr();
        repr.as_ref()
            .iter()
            .take(16)
            .rev()
            .fold(0u128, |acc, &byte| (acc << 8) | byte as u128)
    }
}

mod mersenne_127 {
    use ff::PrimeField;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Finite field mod 2^127-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "170141183460469231731687303715884105727"]
    #[PrimeFieldGenerator = "43"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne127([u64; 2]);

    impl Serialize for Mersenne127 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_repr().0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Mersenne127 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = Mersenne127Repr(Deserialize::deserialize(deserializer)?);
            Self::from_repr_vartime(repr)
                .ok_or_else(|| serde::de::Error::custom("Invalid field element"))
        }
    }

    impl super::MpcField for Mersenne127 {
        const SAFE_BITS: usize = 125;
    }
}

pub use mersenne_127::{Mersenne127, Mersenne127Repr};
