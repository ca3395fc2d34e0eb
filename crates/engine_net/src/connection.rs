//! TCP connection management.
//!
//! Provides [`Connection`], a framed stream that speaks in batches of
//! [`UpdateOp`]s, plus helpers for dialing a server and admitting a peer on
//! the listening side.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::codec::{Compression, decode_batch, encode_batch};
use crate::error::NetError;
use crate::frame::FramedStream;
use crate::handshake::{client_handshake, server_handshake};
use crate::messages::UpdateOp;

/// Default server address.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:5560";

/// The environment variable used to override the server address.
pub const SERVER_ADDR_ENV: &str = "ENGINE_SERVER_ADDR";

/// Default bound on how long either side waits for the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read the server address from [`SERVER_ADDR_ENV`], falling back to
/// [`DEFAULT_SERVER_ADDR`].
#[must_use]
pub fn server_addr_from_env() -> String {
    std::env::var(SERVER_ADDR_ENV).unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
}

/// A handshaken, framed connection to one peer.
///
/// `peer_id` is the id of the process on the *other* end when held by the
/// server, and the local id when held by a client.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    peer_id: String,
    framed: FramedStream<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already framed stream.
    #[must_use]
    pub fn new(peer_id: impl Into<String>, framed: FramedStream<S>) -> Self {
        Self {
            peer_id: peer_id.into(),
            framed,
        }
    }

    /// The peer id bound to this connection.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The compression agreed during the handshake.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.framed.compression()
    }

    /// Encode and send one batch. Returns the bytes written to the socket,
    /// header included.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding fails, the payload is too large, or
    /// the socket write fails.
    pub async fn send_batch(&mut self, ops: &[UpdateOp]) -> Result<usize, NetError> {
        let payload = encode_batch(ops)?;
        let written = self.framed.send(&payload).await?;
        debug!(peer = %self.peer_id, ops = ops.len(), bytes = written, "batch sent");
        Ok(written)
    }

    /// Decode the next batch if a whole frame is available without waiting.
    ///
    /// Returns the ops together with the decoded payload size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] on disconnect, a malformed frame, or a payload
    /// that is not a JSON array of ops.
    pub fn try_receive_batch(&mut self) -> Result<Option<(Vec<UpdateOp>, usize)>, NetError> {
        match self.framed.try_receive()? {
            Some(payload) => self.decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for the next batch.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::try_receive_batch`].
    pub async fn receive_batch(&mut self) -> Result<(Vec<UpdateOp>, usize), NetError> {
        let payload = self.framed.receive().await?;
        self.decode(&payload)
    }

    fn decode(&self, payload: &[u8]) -> Result<(Vec<UpdateOp>, usize), NetError> {
        let ops = decode_batch(payload)?;
        debug!(peer = %self.peer_id, ops = ops.len(), bytes = payload.len(), "batch received");
        Ok((ops, payload.len()))
    }
}

/// Dial a server, introduce ourselves as `peer_id`, and negotiate compression.
///
/// # Errors
///
/// Returns [`NetError`] if the connection cannot be established or the
/// handshake fails.
pub async fn connect(
    addr: &str,
    peer_id: &str,
    requested: Compression,
    timeout: Duration,
) -> Result<Connection<TcpStream>, NetError> {
    info!(addr, peer_id, "connecting to server");
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let compression = client_handshake(&mut stream, peer_id, requested, timeout).await?;
    info!(addr, ?compression, "connection established");
    Ok(Connection::new(peer_id, FramedStream::new(stream, compression)))
}

/// Run the server half of the handshake on a freshly accepted socket.
///
/// # Errors
///
/// Returns [`NetError`] if the handshake fails or times out.
pub async fn accept_peer(
    mut stream: TcpStream,
    remote: SocketAddr,
    allowed: Compression,
    timeout: Duration,
) -> Result<Connection<TcpStream>, NetError> {
    stream.set_nodelay(true)?;
    let (peer_id, compression) = server_handshake(&mut stream, allowed, timeout).await?;
    info!(%remote, peer = %peer_id, ?compression, "peer admitted");
    Ok(Connection::new(peer_id, FramedStream::new(stream, compression)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{DuplexStream, duplex};
    use tokio::net::TcpListener;

    use super::*;

    fn pair(compression: Compression) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        (
            Connection::new("client", FramedStream::new(a, compression)),
            Connection::new("client", FramedStream::new(b, compression)),
        )
    }

    fn sample_batch() -> Vec<UpdateOp> {
        let data = match json!({"x": 1, "y": 2}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        vec![
            UpdateOp::create("p1", "player", data.clone()),
            UpdateOp::update("p1", data),
            UpdateOp::delete("p1"),
        ]
    }

    #[tokio::test]
    async fn test_batch_round_trip() {
        let (mut left, mut right) = pair(Compression::None);
        let ops = sample_batch();
        left.send_batch(&ops).await.unwrap();
        let (received, bytes) = right.receive_batch().await.unwrap();
        assert_eq!(received, ops);
        assert_eq!(bytes, encode_batch(&ops).unwrap().len());
    }

    #[tokio::test]
    async fn test_try_receive_batch_empty() {
        let (_left, mut right) = pair(Compression::None);
        assert!(right.try_receive_batch().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_batch_is_delivered() {
        let (mut left, mut right) = pair(Compression::Deflate);
        left.send_batch(&[]).await.unwrap();
        let (received, _) = right.receive_batch().await.unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn test_server_addr_default() {
        // Only meaningful when the variable is not set in the test environment.
        if std::env::var(SERVER_ADDR_ENV).is_err() {
            assert_eq!(server_addr_from_env(), DEFAULT_SERVER_ADDR);
        }
    }

    #[tokio::test]
    async fn test_connect_and_accept_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, remote) = listener.accept().await.unwrap();
            let mut conn =
                accept_peer(stream, remote, Compression::Deflate, DEFAULT_HANDSHAKE_TIMEOUT)
                    .await
                    .unwrap();
            assert_eq!(conn.peer_id(), "tester");
            conn.send_batch(&[UpdateOp::delete("w1")]).await.unwrap();
        });

        let mut client = connect(&addr, "tester", Compression::Deflate, DEFAULT_HANDSHAKE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(client.compression(), Compression::Deflate);
        let (ops, _) = client.receive_batch().await.unwrap();
        assert_eq!(ops, vec![UpdateOp::delete("w1")]);
        server.await.unwrap();
    }
}
