//! Batch and payload codec helpers.
//!
//! Batches travel as UTF-8 JSON arrays of [`UpdateOp`]. When compression is
//! negotiated for a connection, the framed payload is additionally wrapped in
//! a zlib stream at best compression.

use std::io::{self, Read, Write};

use flate2::Compression as Level;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::NetError;
use crate::messages::UpdateOp;

/// Largest payload a compressed frame may inflate to.
pub const MAX_INFLATED_LEN: usize = 64 * 1024 * 1024;

/// Payload wrapping agreed for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Payloads are sent as-is.
    #[default]
    None,
    /// Payloads are deflated (zlib container, best compression).
    Deflate,
}

impl Compression {
    /// Compress an outgoing payload.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Compression`] if the encoder fails.
    pub fn compress(self, payload: &[u8]) -> Result<Vec<u8>, NetError> {
        match self {
            Self::None => Ok(payload.to_vec()),
            Self::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Level::best());
                encoder.write_all(payload).map_err(NetError::Compression)?;
                encoder.finish().map_err(NetError::Compression)
            }
        }
    }

    /// Decompress an incoming payload.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Compression`] if the payload is not a valid zlib
    /// stream or inflates past [`MAX_INFLATED_LEN`]. With mismatched
    /// settings this is where the corruption surfaces.
    pub fn decompress(self, payload: Vec<u8>) -> Result<Vec<u8>, NetError> {
        match self {
            Self::None => Ok(payload),
            Self::Deflate => inflate(&payload, MAX_INFLATED_LEN),
        }
    }
}

fn inflate(payload: &[u8], limit: usize) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::new();
    ZlibDecoder::new(payload)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(NetError::Compression)?;
    if out.len() > limit {
        return Err(NetError::Compression(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload inflates past {limit} bytes"),
        )));
    }
    Ok(out)
}

/// Encode a batch of ops to JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode_batch(ops: &[UpdateOp]) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(ops).map_err(NetError::Encode)
}

/// Decode a batch of ops from JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if the bytes are not a JSON array of ops.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<UpdateOp>, NetError> {
    serde_json::from_slice(bytes).map_err(NetError::Decode)
}
