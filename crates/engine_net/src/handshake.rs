//! Connection handshake and compression negotiation.
//!
//! Right after TCP connect, and before framing starts, the client writes one
//! raw UTF-8 hello line naming itself and optionally asking for compression:
//!
//! ```text
//! 3f2a9c41 deflate\n
//! ```
//!
//! The server answers with a single raw byte: `D` if deflate is on for this
//! connection, `P` if payloads travel plain. Deflate is on only when the
//! client asked for it and the server allows it, so a mismatched setting can
//! never corrupt decoding. After the answer both sides switch to frames.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::Compression;
use crate::error::NetError;

/// Longest hello line accepted, terminator included.
pub const MAX_HELLO_LEN: usize = 256;

/// Longest peer id accepted.
pub const MAX_PEER_ID_LEN: usize = 128;

const DEFLATE_CAPABILITY: &str = "deflate";
const ACK_DEFLATE: u8 = b'D';
const ACK_PLAIN: u8 = b'P';

/// The client's self-introduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// The connecting process's id; becomes the `updater` of its entities.
    pub peer_id: String,
    /// Whether the client would like deflated payloads.
    pub deflate: bool,
}

impl Hello {
    /// Render the hello line, terminator included.
    #[must_use]
    pub fn encode(&self) -> String {
        if self.deflate {
            format!("{} {DEFLATE_CAPABILITY}\n", self.peer_id)
        } else {
            format!("{}\n", self.peer_id)
        }
    }

    /// Parse a hello line (without its terminator).
    ///
    /// Unknown capability words are ignored so newer clients can talk to
    /// older servers.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Handshake`] if the peer id is missing or invalid.
    pub fn parse(line: &str) -> Result<Self, NetError> {
        let mut words = line.split_ascii_whitespace();
        let peer_id = words
            .next()
            .ok_or_else(|| NetError::Handshake("hello line is empty".into()))?;
        validate_peer_id(peer_id)?;
        let deflate = words.any(|word| word == DEFLATE_CAPABILITY);
        Ok(Self {
            peer_id: peer_id.to_string(),
            deflate,
        })
    }
}

/// Check that a peer id can be carried in a hello line.
///
/// # Errors
///
/// Returns [`NetError::Handshake`] if the id is empty, too long, or contains
/// whitespace.
pub fn validate_peer_id(peer_id: &str) -> Result<(), NetError> {
    if peer_id.is_empty() {
        return Err(NetError::Handshake("peer id is empty".into()));
    }
    if peer_id.len() > MAX_PEER_ID_LEN {
        return Err(NetError::Handshake(format!(
            "peer id is longer than {MAX_PEER_ID_LEN} bytes"
        )));
    }
    if peer_id.chars().any(char::is_whitespace) {
        return Err(NetError::Handshake(format!(
            "peer id {peer_id:?} contains whitespace"
        )));
    }
    Ok(())
}

/// Run the client half of the handshake and return the agreed compression.
///
/// # Errors
///
/// Returns [`NetError::HandshakeTimeout`] if the server does not answer in
/// time, [`NetError::Handshake`] on an unknown answer, or a disconnect/I/O
/// error.
pub async fn client_handshake<S>(
    stream: &mut S,
    peer_id: &str,
    requested: Compression,
    timeout: Duration,
) -> Result<Compression, NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    validate_peer_id(peer_id)?;
    let hello = Hello {
        peer_id: peer_id.to_string(),
        deflate: requested == Compression::Deflate,
    };

    let exchange = async {
        stream.write_all(hello.encode().as_bytes()).await?;
        stream.flush().await?;
        let ack = stream.read_u8().await?;
        Ok::<u8, std::io::Error>(ack)
    };
    let ack = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NetError::HandshakeTimeout)?
        .map_err(io_to_net)?;

    match ack {
        ACK_DEFLATE => Ok(Compression::Deflate),
        ACK_PLAIN => Ok(Compression::None),
        other => Err(NetError::Handshake(format!(
            "unexpected handshake answer {other:#04x}"
        ))),
    }
}

/// Run the server half of the handshake.
///
/// Reads the hello line, decides the compression for this connection, and
/// answers. Returns the peer id and the agreed compression.
///
/// # Errors
///
/// Returns [`NetError::HandshakeTimeout`] if the client stalls,
/// [`NetError::Handshake`] if the hello is not valid UTF-8, too long, or
/// names an invalid peer id, or a disconnect/I/O error.
pub async fn server_handshake<S>(
    stream: &mut S,
    allowed: Compression,
    timeout: Duration,
) -> Result<(String, Compression), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exchange = async {
        let line = read_hello_line(stream).await?;
        let hello = Hello::parse(&line)?;
        let agreed = if hello.deflate && allowed == Compression::Deflate {
            Compression::Deflate
        } else {
            Compression::None
        };
        let ack = match agreed {
            Compression::Deflate => ACK_DEFLATE,
            Compression::None => ACK_PLAIN,
        };
        stream.write_all(&[ack]).await.map_err(io_to_net)?;
        stream.flush().await.map_err(io_to_net)?;
        Ok::<_, NetError>((hello.peer_id, agreed))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NetError::HandshakeTimeout)?
}

/// Read bytes up to the first `\n`. The client sends nothing else until it
/// has the answer, so reading byte by byte never consumes frame data.
async fn read_hello_line<S>(stream: &mut S) -> Result<String, NetError>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await.map_err(io_to_net)?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
        if line.len() >= MAX_HELLO_LEN {
            return Err(NetError::Handshake(format!(
                "hello line exceeds {MAX_HELLO_LEN} bytes"
            )));
        }
    }
    String::from_utf8(line).map_err(|_| NetError::Handshake("hello line is not UTF-8".into()))
}

fn io_to_net(err: std::io::Error) -> NetError {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof => NetError::Disconnected,
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe => NetError::ConnectionReset,
        _ => NetError::Io(err),
    }
}
