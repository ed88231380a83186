use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::fields::MpcField;
use crate::{MpcContext, MpcDealer};

use super::{SpdzDealer, SpdzShare};

/// Insecure dealer for SPDZ protocol, deriving every preprocessed value from a seed shared by
/// all parties. Every party must use the same seed and request parameters in the same order.
pub struct FakeSpdzDealer<T> {
    dealing: Dealing<T>,
    triples: SharedStream,
    uints: SharedStream,
    input_masks: Vec<SharedStream>,
}

impl<T: MpcField> FakeSpdzDealer<T> {
    pub fn new(num_parties: usize, party_id: usize, seed: u8) -> Self {
        let mut root = SmallRng::from_seed([seed; 32]);
        let mut key_stream = SharedStream::fork(&mut root);
        let auth_key = T::random(&mut key_stream.rng);
        let dealing = Dealing {
            num_parties,
            party_id,
            auth_key,
            auth_key_share: T::zero(),
        };
        let auth_key_share = dealing.split(&mut key_stream, auth_key);

        Self {
            dealing: Dealing {
                auth_key_share,
                ..dealing
            },
            triples: SharedStream::fork(&mut root),
            uints: SharedStream::fork(&mut root),
            input_masks: (0..num_parties)
                .map(|_| SharedStream::fork(&mut root))
                .collect(),
        }
    }
}

impl<T: MpcField> MpcContext for FakeSpdzDealer<T> {
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.dealing.num_parties
    }

    fn party_id(&self) -> usize {
        self.dealing.party_id
    }
}

impl<T: MpcField> MpcDealer for FakeSpdzDealer<T> {
    fn share_plain(&self, x: T) -> SpdzShare<T> {
        SpdzShare::from_plain(x, self.dealing.auth_key_share, self.dealing.party_id)
    }

    fn next_beaver_triple(&mut self) -> (SpdzShare<T>, SpdzShare<T>, SpdzShare<T>) {
        let (a, a_share) = self.dealing.random(&mut self.triples);
        let (b, b_share) = self.dealing.random(&mut self.triples);
        let c_share = self.dealing.authenticate(&mut self.triples, a * b);
        (a_share, b_share, c_share)
    }

    fn next_uint(&mut self, bits: usize) -> SpdzShare<T> {
        let value = match bits {
            0 => 0,
            _ => self.uints.rng.gen::<u128>() >> (128 - bits),
        };
        self.dealing.authenticate(&mut self.uints, T::from_u128(value))
    }
}

impl<T: MpcField> SpdzDealer for FakeSpdzDealer<T> {
    fn authentication_key_share(&self) -> T {
        self.dealing.auth_key_share
    }

    fn next_input_mask_own(&mut self) -> (SpdzShare<T>, T) {
        let (mask, share) = self
            .dealing
            .random(&mut self.input_masks[self.dealing.party_id]);
        (share, mask)
    }

    fn next_input_mask_for(&mut self, id: usize) -> SpdzShare<T> {
        self.dealing.random(&mut self.input_masks[id]).1
    }
}

/// Random stream replicated at every party.
struct SharedStream {
    rng: SmallRng,
}

impl SharedStream {
    fn fork(root: &mut SmallRng) -> Self {
        Self {
            rng: SmallRng::from_seed(root.gen()),
        }
    }
}

/// Splitting of values into additive shares held by current party.
#[derive(Copy, Clone)]
struct Dealing<T> {
    num_parties: usize,
    party_id: usize,
    auth_key: T,
    auth_key_share: T,
}

impl<T: MpcField> Dealing<T> {
    /// Local additive share of value. Parties other than 0 hold random masks,
    /// party 0 holds the value minus all masks.
    fn split(&self, stream: &mut SharedStream, value: T) -> T {
        let masks: Vec<T> = (1..self.num_parties)
            .map(|_| T::random(&mut stream.rng))
            .collect();
        match self.party_id {
            0 => masks.iter().fold(value, |acc, &mask| acc - mask),
            id => masks[id - 1],
        }
    }

    fn authenticate(&self, stream: &mut SharedStream, value: T) -> SpdzShare<T> {
        SpdzShare {
            value: self.split(stream, value),
            mac: self.split(stream, value * self.auth_key),
        }
    }

    /// Random value together with its authenticated share.
    fn random(&self, stream: &mut SharedStream) -> (T, SpdzShare<T>) {
        let value = T::random(&mut stream.rng);
        (value, self.authenticate(stream, value))
    }
}
