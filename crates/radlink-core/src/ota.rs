//! OTA binary sub-protocol codec
//!
//! Firmware bytes travel over the same command channel as JSON-RPC, as
//! hex-encoded binary packets:
//!
//! ```text
//! begin = [0x01][u32 total size LE]
//! chunk = [u32 offset LE][u16 length LE][chunk bytes]
//! end   = [0x02]
//! ACK   = single byte 0x06
//! ```
//!
//! The byte order and framing offsets are easy to get wrong, so the codec
//! is pure and tested in isolation; the uploader in `radlink-client` only
//! calls `encode_*` and compares responses against [`ACK`].

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Opcode for the begin-transfer packet.
pub const OP_BEGIN: u8 = 0x01;
/// Opcode for the end-transfer packet.
pub const OP_END: u8 = 0x02;
/// Single-byte acknowledgment the device sends after begin and each chunk.
pub const ACK: u8 = 0x06;

/// Chunk header size: u32 offset + u16 length.
const CHUNK_HEADER_LEN: usize = 6;

/// Decoding errors for the OTA sub-protocol.
#[derive(Debug, Error, PartialEq)]
pub enum OtaCodecError {
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unexpected opcode 0x{0:02X}")]
    BadOpcode(u8),

    #[error("chunk length field {declared} does not match payload length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A decoded chunk packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPacket {
    pub offset: u32,
    pub data: Vec<u8>,
}

/// Encode a begin-transfer packet carrying the total image size.
pub fn encode_begin(total_size: u32) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(OP_BEGIN);
    buf.put_u32_le(total_size);
    buf.to_vec()
}

/// Encode a data chunk at the given image offset.
pub fn encode_chunk(offset: u32, data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() <= u16::MAX as usize);
    let mut buf = BytesMut::with_capacity(CHUNK_HEADER_LEN + data.len());
    buf.put_u32_le(offset);
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
    buf.to_vec()
}

/// Encode an end-transfer packet.
pub fn encode_end() -> Vec<u8> {
    vec![OP_END]
}

/// Decode a begin-transfer packet, returning the declared total size.
pub fn decode_begin(packet: &[u8]) -> Result<u32, OtaCodecError> {
    if packet.len() < 5 {
        return Err(OtaCodecError::Truncated {
            expected: 5,
            actual: packet.len(),
        });
    }
    let mut buf = packet;
    let opcode = buf.get_u8();
    if opcode != OP_BEGIN {
        return Err(OtaCodecError::BadOpcode(opcode));
    }
    Ok(buf.get_u32_le())
}

/// Decode a chunk packet into its offset and payload.
pub fn decode_chunk(packet: &[u8]) -> Result<ChunkPacket, OtaCodecError> {
    if packet.len() < CHUNK_HEADER_LEN {
        return Err(OtaCodecError::Truncated {
            expected: CHUNK_HEADER_LEN,
            actual: packet.len(),
        });
    }
    let mut buf = packet;
    let offset = buf.get_u32_le();
    let declared = buf.get_u16_le() as usize;
    if declared != buf.remaining() {
        return Err(OtaCodecError::LengthMismatch {
            declared,
            actual: buf.remaining(),
        });
    }
    Ok(ChunkPacket {
        offset,
        data: buf.to_vec(),
    })
}

/// Hex-encode a binary packet for transmission on the text command channel.
pub fn to_wire_text(packet: &[u8]) -> String {
    hex::encode(packet)
}

/// Decode hex wire text back into packet bytes.
pub fn from_wire_text(text: &str) -> Result<Vec<u8>, OtaCodecError> {
    Ok(hex::decode(text.trim())?)
}
