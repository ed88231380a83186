use async_trait::async_trait;
use futures::{Sink, Stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    transport::{MultipartyTransport, TransportError},
    MpcContext, MpcEngine, MpcField,
};

use super::{SpdzDealer, SpdzShare};

/// SPDZ protocol message
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound = "T: MpcField")]
pub enum SpdzMessage<T> {
    Input(Vec<T>),
    PartialOpenShares(Vec<T>),
    PartialOpenSum(Vec<T>),
    IntegrityCheck(T),
}

/// Error during SPDZ protocol execution.
#[derive(Debug, Error)]
pub enum SpdzError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Unexpected message from party {0}")]
    UnexpectedMessage(usize),
    #[error("Party {party} sent {actual} shares, expected {expected}")]
    LengthMismatch {
        party: usize,
        expected: usize,
        actual: usize,
    },
    #[error("MAC check failed, opened values are inconsistent")]
    IntegrityCheckFailed,
}

/// SPDZ protocol implementation.
/// With MAC checks disabled, the engine runs the same protocol with semi-honest security only.
pub struct SpdzEngine<T, Dealer, Channel> {
    dealer: Dealer,
    transport: MultipartyTransport<SpdzMessage<T>, Channel>,
    check_macs: bool,
    unchecked_sigma: T,
    num_unchecked: usize,
}

impl<T: MpcField, Dealer, Channel> SpdzEngine<T, Dealer, Channel> {
    pub fn new(dealer: Dealer, transport: MultipartyTransport<SpdzMessage<T>, Channel>) -> Self {
        Self {
            dealer,
            transport,
            check_macs: true,
            unchecked_sigma: T::zero(),
            num_unchecked: 0,
        }
    }

    /// Disable MAC checks of opened values.
    pub fn without_mac_checks(mut self) -> Self {
        self.check_macs = false;
        self
    }
}

impl<T, Dealer, Channel> MpcContext for SpdzEngine<T, Dealer, Channel>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.transport.num_parties()
    }

    fn party_id(&self) -> usize {
        self.transport.party_id()
    }
}

#[async_trait]
impl<T, E, Dealer, Channel> MpcEngine for SpdzEngine<T, Dealer, Channel>
where
    T: MpcField,
    E: Send,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>> + Send,
    Channel: Stream<Item = Result<SpdzMessage<T>, E>> + Sink<SpdzMessage<T>> + Unpin + Send,
{
    type Dealer = Dealer;
    type Error = SpdzError;

    fn dealer(&mut self) -> &mut Self::Dealer {
        &mut self.dealer
    }

    async fn process_inputs(
        &mut self,
        inputs: Vec<Self::Field>,
    ) -> Result<Vec<Vec<Self::Share>>, SpdzError> {
        debug!(party = self.party_id(), count = inputs.len(), "Sharing inputs");

        let (own_shares, own_deltas): (Vec<_>, Vec<_>) = inputs
            .into_iter()
            .map(|x| {
                let (share, plain) = self.dealer.next_input_mask_own();
                let delta = x - plain;
                (share + self.dealer.share_plain(delta), delta)
            })
            .unzip();

        let received = self
            .transport
            .exchange_with_all(SpdzMessage::Input(own_deltas))
            .await?;

        let mut shares = vec![Vec::new(); self.num_parties()];
        shares[self.party_id()] = own_shares;

        for (other_id, msg) in received {
            let SpdzMessage::Input(deltas) = msg else {
                return Err(SpdzError::UnexpectedMessage(other_id));
            };
            shares[other_id] = deltas
                .into_iter()
                .map(|delta| {
                    let share = self.dealer.next_input_mask_for(other_id);
                    share + self.dealer.share_plain(delta)
                })
                .collect();
        }

        Ok(shares)
    }

    async fn process_openings_unchecked(
        &mut self,
        requests: Vec<Self::Share>,
    ) -> Result<Vec<Self::Field>, SpdzError> {
        trace!(party = self.party_id(), count = requests.len(), "Opening shares");

        let mut values: Vec<_> = requests.iter().map(|x| x.value).collect();

        let values = if self.party_id() == 0 {
            for (other_id, msg) in self.transport.receive_from_all().await? {
                let SpdzMessage::PartialOpenShares(parts) = msg else {
                    return Err(SpdzError::UnexpectedMessage(other_id));
                };
                if parts.len() != values.len() {
                    return Err(SpdzError::LengthMismatch {
                        party: other_id,
                        expected: values.len(),
                        actual: parts.len(),
                    });
                }
                for (value, part) in values.iter_mut().zip(parts) {
                    *value += part;
                }
            }
            self.transport
                .send_to_all(SpdzMessage::PartialOpenSum(values.clone()))
                .await?;
            values
        } else {
            let count = values.len();
            self.transport
                .send_to(0, SpdzMessage::PartialOpenShares(values))
                .await?;
            let SpdzMessage::PartialOpenSum(values) = self.transport.receive_from(0).await? else {
                return Err(SpdzError::UnexpectedMessage(0));
            };
            if values.len() != count {
                return Err(SpdzError::LengthMismatch {
                    party: 0,
                    expected: count,
                    actual: values.len(),
                });
            }
            values
        };

        let key_share = self.dealer.authentication_key_share();
        for (share, value) in requests.iter().zip(&values) {
            self.unchecked_sigma += share.mac - key_share * *value;
        }
        self.num_unchecked += values.len();

        Ok(values)
    }

    async fn check_integrity(&mut self) -> Result<(), SpdzError> {
        if !self.check_macs || self.num_unchecked == 0 {
            return Ok(());
        }

        debug!(
            party = self.party_id(),
            count = self.num_unchecked,
            "Checking MACs of opened values"
        );

        // TODO: commit to sigma shares before revealing them to get malicious security.
        let own_sigma = self.unchecked_sigma;
        let received = self
            .transport
            .exchange_with_all(SpdzMessage::IntegrityCheck(own_sigma))
            .await?;

        let mut total = own_sigma;
        for (other_id, msg) in received {
            let SpdzMessage::IntegrityCheck(sigma) = msg else {
                return Err(SpdzError::UnexpectedMessage(other_id));
            };
            total += sigma;
        }

        self.unchecked_sigma = T::zero();
        self.num_unchecked = 0;

        if bool::from(total.is_zero()) {
            Ok(())
        } else {
            Err(SpdzError::IntegrityCheckFailed)
        }
    }
}
