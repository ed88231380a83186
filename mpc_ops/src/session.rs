use std::collections::HashMap;

use mpc::{
    executor::MpcExecutionContext,
    fields::Mersenne127,
    kernels::{self, SecretDType, SecretValue},
    spdz::{FakeSpdzDealer, SpdzEngine, SpdzMessage, SpdzShare},
    transport::{local_multiparty_channels, BincodeDuplex},
};
use tracing::debug;

use crate::{
    config::{ProtocolKind, SessionConfig},
    error::OpError,
    exec_node::ExecNode,
    tensor::{DataType, Tensor},
};

/// Field of session protocol.
pub type Fp = Mersenne127;

/// Protocol engine of a session.
pub type SessionEngine = SpdzEngine<Fp, FakeSpdzDealer<Fp>, BincodeDuplex<SpdzMessage<Fp>>>;

/// Protocol execution context of a session.
pub type ProtocolContext = MpcExecutionContext<SessionEngine>;

/// Secret value held by a session.
pub type SecretTensor = SecretValue<SpdzShare<Fp>>;

/// Named plaintext tensors and secret values of a single party.
#[derive(Default)]
pub struct TensorTable {
    tensors: HashMap<String, Tensor>,
    secrets: HashMap<String, SecretTensor>,
}

impl TensorTable {
    pub fn add_tensor(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get_tensor(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn add_secret(&mut self, name: impl Into<String>, value: SecretTensor) {
        self.secrets.insert(name.into(), value);
    }

    pub fn get_secret(&self, name: &str) -> Option<&SecretTensor> {
        self.secrets.get(name)
    }
}

/// Execution context of a single party: its tensor table and share of protocol state.
pub struct Session {
    party_id: usize,
    table: TensorTable,
    protocol: ProtocolContext,
}

impl Session {
    pub fn new(party_id: usize, protocol: ProtocolContext) -> Self {
        Self {
            party_id,
            table: TensorTable::default(),
            protocol,
        }
    }

    pub fn party_id(&self) -> usize {
        self.party_id
    }

    pub fn table(&self) -> &TensorTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TensorTable {
        &mut self.table
    }

    pub fn protocol(&self) -> &ProtocolContext {
        &self.protocol
    }

    /// Secret-share tensor owned by a single party. Every party must call this concurrently,
    /// only the owner provides the tensor.
    pub async fn input_secret(
        &mut self,
        name: &str,
        owner: usize,
        dtype: DataType,
        tensor: Option<&Tensor>,
    ) -> Result<(), OpError> {
        let secret_dtype = secret_dtype_of(dtype)?;
        let raw = match tensor {
            Some(tensor) if self.party_id == owner => {
                let (tensor_dtype, raw) = encode_tensor(tensor)?;
                if tensor_dtype != secret_dtype {
                    return Err(OpError::InvalidNode(format!(
                        "Input {} is declared as {}, got {}",
                        name,
                        dtype,
                        tensor.dtype()
                    )));
                }
                raw
            }
            _ => Vec::new(),
        };

        debug!(party = self.party_id, name, owner, "Sharing secret input");
        let value = kernels::input(&self.protocol, owner, secret_dtype, &raw).await?;
        self.table.add_secret(name, value);
        Ok(())
    }

    /// Open named secret value. Every party must call this concurrently.
    pub async fn reveal(&self, name: &str) -> Result<Tensor, OpError> {
        let value = self
            .table
            .get_secret(name)
            .ok_or_else(|| OpError::TensorNotFound(name.into()))?;

        debug!(party = self.party_id, name, "Revealing secret");
        let raw = self
            .protocol
            .run(|ctx| Box::pin(kernels::reveal(ctx, value)))
            .await?;
        decode_tensor(value.dtype, raw)
    }
}

/// Operator node bound to the session it runs in.
pub struct ExecContext {
    node: ExecNode,
    session: Session,
}

impl ExecContext {
    pub fn new(node: ExecNode, session: Session) -> Self {
        Self { node, session }
    }

    pub fn node(&self) -> &ExecNode {
        &self.node
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Node together with mutable session.
    pub fn split_mut(&mut self) -> (&ExecNode, &mut Session) {
        (&self.node, &mut self.session)
    }
}

/// Create sessions of all parties connected with in-memory channels.
pub fn make_sessions(config: &SessionConfig) -> Vec<Session> {
    let num_parties = config.num_parties;
    local_multiparty_channels(num_parties, config.channel_buffer_size)
        .into_iter()
        .enumerate()
        .map(|(party_id, transport)| {
            let dealer = FakeSpdzDealer::new(num_parties, party_id, config.dealer_seed);
            let engine = SpdzEngine::new(dealer, transport);
            let engine = match config.protocol {
                ProtocolKind::Spdz => engine,
                ProtocolKind::SemiHonest => engine.without_mac_checks(),
            };
            Session::new(party_id, MpcExecutionContext::new(engine))
        })
        .collect()
}

/// Create a pair of sessions with default settings.
pub fn make_2pc_sessions(protocol: ProtocolKind) -> Vec<Session> {
    make_sessions(&SessionConfig::two_party(protocol))
}

/// Secret representation of plaintext element type.
pub fn secret_dtype_of(dtype: DataType) -> Result<SecretDType, OpError> {
    match dtype {
        DataType::Int64 => Ok(SecretDType::Int),
        DataType::Float64 => Ok(SecretDType::Fxp),
        _ => Err(OpError::UnsupportedSecretType(dtype)),
    }
}

/// Encode numeric tensor as raw integers of the protocol.
pub fn encode_tensor(tensor: &Tensor) -> Result<(SecretDType, Vec<i128>), OpError> {
    let raw = match tensor {
        Tensor::Int64(x) => (
            SecretDType::Int,
            x.iter().map(|&v| kernels::encode_int(v)).collect(),
        ),
        Tensor::Float64(x) => (
            SecretDType::Fxp,
            x.iter()
                .map(|&v| kernels::encode_real(v))
                .collect::<Result<_, _>>()?,
        ),
        _ => return Err(OpError::UnsupportedSecretType(tensor.dtype())),
    };
    Ok(raw)
}

/// Decode raw integers of the protocol into plaintext tensor.
pub fn decode_tensor(dtype: SecretDType, raw: Vec<i128>) -> Result<Tensor, OpError> {
    Ok(match dtype {
        SecretDType::Int => Tensor::Int64(
            raw.into_iter()
                .map(kernels::decode_int)
                .collect::<Result<Vec<_>, _>>()?
                .into(),
        ),
        SecretDType::Fxp => Tensor::Float64(raw.into_iter().map(kernels::decode_real).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding() {
        let (dtype, raw) = encode_tensor(&Tensor::from(vec![0.5, -2.0])).unwrap();
        assert_eq!(dtype, SecretDType::Fxp);
        assert_eq!(raw, vec![1 << 15, -(2 << 16)]);
        assert_eq!(
            decode_tensor(dtype, raw).unwrap(),
            Tensor::from(vec![0.5, -2.0])
        );

        assert!(matches!(
            encode_tensor(&Tensor::from(vec![true])),
            Err(OpError::UnsupportedSecretType(DataType::Bool))
        ));
        let (_, raw) = encode_tensor(&Tensor::from(vec![i64::MAX, 1i64 << 40])).unwrap();
        assert_eq!(raw, vec![i64::MAX as i128, 1 << 40]);
        assert!(matches!(
            encode_tensor(&Tensor::from(vec![1e15])),
            Err(OpError::Numeric(_))
        ));
    }

    #[tokio::test]
    async fn test_input_and_reveal() {
        let mut sessions = make_2pc_sessions(ProtocolKind::Spdz);
        let tensor = Tensor::from(vec![1i64, -2, 3]);

        futures::future::try_join_all(sessions.iter_mut().map(|session| {
            let tensor = (session.party_id() == 1).then(|| &tensor);
            session.input_secret("x", 1, DataType::Int64, tensor)
        }))
        .await
        .unwrap();

        let revealed =
            futures::future::try_join_all(sessions.iter().map(|session| session.reveal("x")))
                .await
                .unwrap();
        assert_eq!(revealed, vec![tensor.clone(), tensor]);
    }

    #[tokio::test]
    async fn test_reveal_missing() {
        let sessions = make_2pc_sessions(ProtocolKind::SemiHonest);
        assert!(matches!(
            sessions[0].reveal("missing").await,
            Err(OpError::TensorNotFound(_))
        ));
    }
}
