use futures::{
    future::{try_join, try_join_all},
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, Stream, StreamExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::DuplexStream;
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;
use tracing::trace;

/// Error type for channels.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Error while sending message to {0}")]
    Send(usize),
    #[error("Malformed message from {0}")]
    Recv(usize),
    #[error("Party {0} closed connection")]
    Closed(usize),
}

/// Connection with a single peer, split into independent halves.
struct PeerLink<T, Channel> {
    id: usize,
    sink: SplitSink<Channel, T>,
    stream: SplitStream<Channel>,
}

impl<T, E, Channel> PeerLink<T, Channel>
where
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    async fn send(&mut self, msg: T) -> Result<(), TransportError> {
        trace!(peer = self.id, "Sending message");
        self.sink
            .send(msg)
            .await
            .map_err(|_| TransportError::Send(self.id))
    }

    async fn recv(&mut self) -> Result<T, TransportError> {
        match self.stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            Some(Err(_)) => Err(TransportError::Recv(self.id)),
            None => Err(TransportError::Closed(self.id)),
        }
    }
}

/// Connections of a single party with every other party of multi-party protocol.
/// Dropping the transport closes all connections, so pending receives of peers fail.
pub struct MultipartyTransport<T, Channel> {
    links: Vec<Option<PeerLink<T, Channel>>>,
    party_id: usize,
}

impl<T, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Create transport from connections indexed by peer ID. All channels but party_id should be present.
    pub fn new(channels: impl IntoIterator<Item = Option<Channel>>, party_id: usize) -> Self {
        let links: Vec<_> = channels
            .into_iter()
            .enumerate()
            .map(|(id, channel)| {
                channel.map(|channel| {
                    let (sink, stream) = channel.split();
                    PeerLink { id, sink, stream }
                })
            })
            .collect();
        for (id, link) in links.iter().enumerate() {
            if id != party_id && link.is_none() {
                panic!("Channel missing for party {}", id);
            }
        }
        Self { links, party_id }
    }
}

impl<T, Channel> MultipartyTransport<T, Channel> {
    /// Number of parties participating in multi-party protocol.
    pub fn num_parties(&self) -> usize {
        self.links.len()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    fn link(&mut self, other_id: usize) -> &mut PeerLink<T, Channel> {
        match self.links[other_id].as_mut() {
            Some(link) if other_id != self.party_id => link,
            _ => panic!("No connection from party {} to itself", other_id),
        }
    }

    fn peers(&mut self) -> impl Iterator<Item = &mut PeerLink<T, Channel>> {
        self.links.iter_mut().flatten()
    }
}

impl<T, E, Channel> MultipartyTransport<T, Channel>
where
    T: Clone,
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send message to party with given ID.
    pub async fn send_to(&mut self, other_id: usize, msg: T) -> Result<(), TransportError> {
        self.link(other_id).send(msg).await
    }

    /// Receive message from party with given ID.
    pub async fn receive_from(&mut self, other_id: usize) -> Result<T, TransportError> {
        self.link(other_id).recv().await
    }

    /// Send message to all parties.
    pub async fn send_to_all(&mut self, msg: T) -> Result<(), TransportError> {
        try_join_all(self.peers().map(|link| link.send(msg.clone()))).await?;
        Ok(())
    }

    /// Receive messages from all parties, ordered by party ID.
    pub async fn receive_from_all(&mut self) -> Result<Vec<(usize, T)>, TransportError> {
        try_join_all(self.peers().map(|link| async move {
            let msg = link.recv().await?;
            Ok::<_, TransportError>((link.id, msg))
        }))
        .await
    }

    /// Concurrently send message to all parties and receive their messages, ordered by party ID.
    pub async fn exchange_with_all(&mut self, msg: T) -> Result<Vec<(usize, T)>, TransportError> {
        try_join_all(self.peers().map(|link| {
            let msg = msg.clone();
            async move {
                let id = link.id;
                let PeerLink { sink, stream, .. } = link;
                let send = async {
                    sink.send(msg).await.map_err(|_| TransportError::Send(id))
                };
                let recv = async {
                    match stream.next().await {
                        Some(Ok(msg)) => Ok(msg),
                        Some(Err(_)) => Err(TransportError::Recv(id)),
                        None => Err(TransportError::Closed(id)),
                    }
                };
                let ((), received) = try_join(send, recv).await?;
                Ok::<_, TransportError>((id, received))
            }
        }))
        .await
    }
}

/// Length-framed Bincode-encoded in-memory channel.
pub type BincodeDuplex<T> = tokio_serde::Framed<
    tokio_util::codec::Framed<DuplexStream, LengthDelimitedCodec>,
    T,
    T,
    Bincode<T, T>,
>;

/// Create bidirectional in-memory channel with given buffer size in bytes.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    let frame = |stream| {
        tokio_serde::Framed::new(
            tokio_util::codec::Framed::new(stream, LengthDelimitedCodec::new()),
            Bincode::default(),
        )
    };
    (frame(a), frame(b))
}

/// Connect parties living in a single process with in-memory channels.
/// Returns transports indexed by party ID.
pub fn local_multiparty_channels<T>(
    num_parties: usize,
    max_buf_size: usize,
) -> Vec<MultipartyTransport<T, BincodeDuplex<T>>>
where
    T: Clone + Serialize + DeserializeOwned + Unpin,
{
    let mut matrix: Vec<Vec<_>> = (0..num_parties)
        .map(|_| (0..num_parties).map(|_| None).collect())
        .collect();

    for i in 0..num_parties {
        for j in 0..i {
            let (a, b) = bincode_duplex::<T>(max_buf_size);
            matrix[i][j] = Some(a);
            matrix[j][i] = Some(b);
        }
    }

    matrix
        .into_iter()
        .enumerate()
        .map(|(id, row)| MultipartyTransport::new(row, id))
        .collect()
}
