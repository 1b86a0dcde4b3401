//! Save-record framing for the playback core.
//!
//! A save is a fixed-size header followed by a MessagePack payload. The
//! header carries a magic tag, a single format version and the payload
//! length; there is no schema evolution beyond refusing unknown versions.

use std::convert::TryFrom;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Bytes that prefix every save record ("GLUE").
pub const SAVE_MAGIC: [u8; 4] = *b"GLUE";

/// Save format revision understood by this crate.
pub const SAVE_VERSION: u16 = 0x0001;

/// Length of the binary header in bytes.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4;

/// Sections a save file may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Hash)]
#[repr(u16)]
pub enum RecordKind {
    Session = 0x0001,
    Interpreter = 0x0002,
}

impl TryFrom<u16> for RecordKind {
    type Error = ();

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Session),
            0x0002 => Ok(Self::Interpreter),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u16,
    pub kind: RecordKind,
    pub length: u32,
}

impl RecordHeader {
    /// Encode the header as big-endian bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&SAVE_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_be_bytes());
        out[6..8].copy_from_slice(&(self.kind as u16).to_be_bytes());
        out[8..12].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    pub fn decode(input: &[u8]) -> Result<Self, SaveError> {
        if input.len() < HEADER_LEN {
            return Err(SaveError::TruncatedHeader);
        }
        if input[..4] != SAVE_MAGIC {
            return Err(SaveError::BadMagic);
        }
        let mut version_bytes = &input[4..6];
        let version = version_bytes.get_u16();
        if version != SAVE_VERSION {
            return Err(SaveError::UnsupportedVersion(version));
        }
        let mut kind_bytes = &input[6..8];
        let kind_raw = kind_bytes.get_u16();
        let kind =
            RecordKind::try_from(kind_raw).map_err(|_| SaveError::UnknownRecordKind(kind_raw))?;
        let mut len_bytes = &input[8..12];
        let length = len_bytes.get_u32();
        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("header smaller than {HEADER_LEN} bytes")]
    TruncatedHeader,
    #[error("header magic mismatch")]
    BadMagic,
    #[error("save version {0:#06x} is not supported")]
    UnsupportedVersion(u16),
    #[error("record kind {0:#06x} is unknown")]
    UnknownRecordKind(u16),
    #[error("expected a {expected:?} record, found {actual:?}")]
    WrongRecordKind {
        expected: RecordKind,
        actual: RecordKind,
    },
    #[error("payload length mismatch: header declared {expected} bytes but read {actual}")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),
}

/// Frames a record for writing to the host's save file.
pub fn encode_record<T>(kind: RecordKind, payload: &T) -> Result<Vec<u8>, SaveError>
where
    T: Serialize,
{
    let payload_bytes = rmp_serde::to_vec_named(payload)?;
    let header = RecordHeader {
        version: SAVE_VERSION,
        kind,
        length: u32::try_from(payload_bytes.len()).map_err(|_| SaveError::LengthMismatch {
            expected: u32::MAX,
            actual: payload_bytes.len(),
        })?,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload_bytes.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Splits a framed record into header and payload bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<(RecordHeader, &[u8]), SaveError> {
    if bytes.len() < HEADER_LEN {
        return Err(SaveError::TruncatedHeader);
    }
    let header = RecordHeader::decode(&bytes[..HEADER_LEN])?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.length as usize {
        return Err(SaveError::LengthMismatch {
            expected: header.length,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

/// Decodes a framed record of the expected kind.
pub fn decode_record<T>(kind: RecordKind, bytes: &[u8]) -> Result<T, SaveError>
where
    T: for<'de> Deserialize<'de>,
{
    let (header, payload) = decode_envelope(bytes)?;
    if header.kind != kind {
        return Err(SaveError::WrongRecordKind {
            expected: kind,
            actual: header.kind,
        });
    }
    let value = rmp_serde::from_slice(payload)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        room: u16,
        lines: Vec<(String, u32)>,
    }

    fn sample() -> Sample {
        Sample {
            room: 1203,
            lines: vec![("1203.rom:14".to_string(), 3), ("inv.txt:2".to_string(), u32::MAX)],
        }
    }

    #[test]
    fn header_layout_is_stable() {
        let header = RecordHeader {
            version: SAVE_VERSION,
            kind: RecordKind::Interpreter,
            length: 0x0102_0304,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[..4], b"GLUE");
        assert_eq!(&bytes[4..], &[0, 1, 0, 2, 1, 2, 3, 4]);
        assert_eq!(RecordHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn record_survives_framing() {
        let bytes = encode_record(RecordKind::Session, &sample()).unwrap();
        let decoded: Sample = decode_record(RecordKind::Session, &bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn rejects_corrupt_frames() {
        let mut bytes = encode_record(RecordKind::Session, &sample()).unwrap();

        let err = decode_record::<Sample>(RecordKind::Interpreter, &bytes).unwrap_err();
        assert!(matches!(err, SaveError::WrongRecordKind { .. }));

        bytes.pop();
        let err = decode_record::<Sample>(RecordKind::Session, &bytes).unwrap_err();
        assert!(matches!(err, SaveError::LengthMismatch { .. }));

        bytes[0] = b'X';
        assert!(matches!(
            decode_envelope(&bytes).unwrap_err(),
            SaveError::BadMagic
        ));

        assert!(matches!(
            decode_envelope(&bytes[..5]).unwrap_err(),
            SaveError::TruncatedHeader
        ));
    }

    #[test]
    fn rejects_future_versions() {
        let mut bytes = encode_record(RecordKind::Session, &sample()).unwrap();
        bytes[5] = 2;
        assert!(matches!(
            decode_envelope(&bytes).unwrap_err(),
            SaveError::UnsupportedVersion(2)
        ));
    }
}
