//! Length-prefixed framing over a byte stream.
//!
//! Every frame is a fixed-width header of [`HEADER_WIDTH`] ASCII decimal
//! digits (zero padded) followed by that many payload bytes:
//!
//! ```text
//! 0000013[{"a": true}]
//! ```
//!
//! Reading is resumable. [`FramedStream::try_receive`] never waits: it pulls
//! whatever bytes are ready, keeps any partial header or body in the stream's
//! own buffer, and returns `Ok(None)` until a whole frame has arrived.

use std::io;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::Compression;
use crate::error::NetError;

/// Number of ASCII digits in a frame header.
pub const HEADER_WIDTH: usize = 7;

/// Largest payload the header can describe (`9_999_999` bytes).
pub const MAX_PAYLOAD_LEN: usize = 10usize.pow(HEADER_WIDTH as u32) - 1;

const READ_CHUNK: usize = 8 * 1024;

/// Partial frame reconstruction state, kept between receive calls.
#[derive(Debug)]
enum ReadState {
    /// Collecting header digits.
    Header(Vec<u8>),
    /// Header parsed; collecting `len` body bytes.
    Body { len: usize, buf: Vec<u8> },
}

impl ReadState {
    fn fresh() -> Self {
        Self::Header(Vec::with_capacity(HEADER_WIDTH))
    }
}

/// A byte stream that sends and receives whole length-prefixed frames.
#[derive(Debug)]
pub struct FramedStream<S> {
    inner: S,
    compression: Compression,
    state: ReadState,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream that has already completed its handshake.
    #[must_use]
    pub fn new(inner: S, compression: Compression) -> Self {
        Self {
            inner,
            compression,
            state: ReadState::fresh(),
        }
    }

    /// The payload compression agreed for this stream.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns a reference to the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns `true` if part of a frame has been read but not yet returned.
    #[must_use]
    pub fn is_mid_frame(&self) -> bool {
        match &self.state {
            ReadState::Header(buf) => !buf.is_empty(),
            ReadState::Body { .. } => true,
        }
    }

    /// Frame and write one payload, returning the number of bytes put on the
    /// wire (header included).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::PayloadTooLarge`] before writing anything if the
    /// (compressed) payload does not fit the header, or a disconnect/I/O
    /// error if the write fails.
    pub async fn send(&mut self, payload: &[u8]) -> Result<usize, NetError> {
        let body = self.compression.compress(payload)?;
        if body.len() > MAX_PAYLOAD_LEN {
            return Err(NetError::PayloadTooLarge {
                len: body.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut frame = Vec::with_capacity(HEADER_WIDTH + body.len());
        let header = format!("{:0width$}", body.len(), width = HEADER_WIDTH);
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(&body);

        self.inner.write_all(&frame).await.map_err(write_error)?;
        self.inner.flush().await.map_err(write_error)?;
        trace!(bytes = frame.len(), "frame sent");
        Ok(frame.len())
    }

    /// Try to complete one frame from the bytes available right now.
    ///
    /// Returns `Ok(None)` when the stream has no more bytes ready. Any partial
    /// header or body read so far is kept for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disconnected`] on a zero-length read,
    /// [`NetError::ConnectionReset`] on reset, [`NetError::InvalidHeader`] if
    /// the length prefix is not decimal, or [`NetError::Compression`] if the
    /// payload does not decompress.
    pub fn try_receive(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let want = self.wanted().min(READ_CHUNK);
            let Some(result) = self.inner.read(&mut chunk[..want]).now_or_never() else {
                return Ok(None);
            };
            let Some(n) = classify_read(result)? else {
                return Ok(None);
            };
            if let Some(frame) = self.absorb(&chunk[..n])? {
                return Ok(Some(frame));
            }
        }
    }

    /// Wait until one whole frame has arrived.
    ///
    /// Used only where the protocol allows the loop to suspend, such as the
    /// initial snapshot right after the handshake.
    ///
    /// # Errors
    ///
    /// Same as [`FramedStream::try_receive`].
    pub async fn receive(&mut self) -> Result<Vec<u8>, NetError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let want = self.wanted().min(READ_CHUNK);
            let result = self.inner.read(&mut chunk[..want]).await;
            let Some(n) = classify_read(result)? else {
                tokio::task::yield_now().await;
                continue;
            };
            if let Some(frame) = self.absorb(&chunk[..n])? {
                return Ok(frame);
            }
        }
    }

    /// Number of bytes still missing from the current header or body.
    fn wanted(&self) -> usize {
        match &self.state {
            ReadState::Header(buf) => HEADER_WIDTH - buf.len(),
            ReadState::Body { len, buf } => len - buf.len(),
        }
    }

    /// Append freshly read bytes and advance the state machine. Never called
    /// with more bytes than [`Self::wanted`].
    fn absorb(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, NetError> {
        match &mut self.state {
            ReadState::Header(buf) => {
                buf.extend_from_slice(bytes);
                if buf.len() < HEADER_WIDTH {
                    return Ok(None);
                }
                let header = std::mem::take(buf);
                let len = match parse_header(&header) {
                    Ok(len) => len,
                    Err(err) => {
                        self.state = ReadState::fresh();
                        return Err(err);
                    }
                };
                self.state = ReadState::Body {
                    len,
                    buf: Vec::with_capacity(len),
                };
            }
            ReadState::Body { buf, .. } => buf.extend_from_slice(bytes),
        }

        match &mut self.state {
            ReadState::Body { len, buf } if buf.len() == *len => {
                let payload = std::mem::take(buf);
                self.state = ReadState::fresh();
                trace!(bytes = payload.len(), "frame received");
                self.compression.decompress(payload).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn parse_header(header: &[u8]) -> Result<usize, NetError> {
    if header.len() == HEADER_WIDTH && header.iter().all(u8::is_ascii_digit) {
        // All-digit ASCII is valid UTF-8 and fits in a usize.
        let text = std::str::from_utf8(header).unwrap_or_default();
        if let Ok(len) = text.parse() {
            return Ok(len);
        }
    }
    Err(NetError::InvalidHeader(
        String::from_utf8_lossy(header).into_owned(),
    ))
}

/// Map a raw read result onto the framing taxonomy. `Ok(None)` means "no
/// data right now, try again later".
fn classify_read(result: io::Result<usize>) -> Result<Option<usize>, NetError> {
    match result {
        Ok(0) => Err(NetError::Disconnected),
        Ok(n) => Ok(Some(n)),
        Err(err) => match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Err(NetError::ConnectionReset),
            io::ErrorKind::UnexpectedEof => Err(NetError::Disconnected),
            _ => Err(NetError::Io(err)),
        },
    }
}

fn write_error(err: io::Error) -> NetError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => NetError::ConnectionReset,
        _ => NetError::Io(err),
    }
}
