use crate::errors::CoreError;
use super::cache::CacheKind;

/// Magic bytes identifying a power-law cache file.
pub const MAGIC: &[u8; 4] = b"PLWC";

/// Current file format version.
pub const CURRENT_VERSION: u16 = 1;

/// Header size in bytes:
/// magic(4) + version(2) + kind(1) + timestamp(8) + payload_len(8) = 23
pub const MIN_HEADER_SIZE: usize = 23;

/// Header read from a cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u16,
    pub kind: CacheKind,
    pub timestamp_ms: i64,
    pub payload_len: u64,
}

/// Write a complete cache file to bytes.
///
/// Layout:
/// ```text
/// [PLWC: 4B] [version: 2B LE] [kind: 1B] [timestamp_ms: 8B LE]
/// [payload_len: 8B LE] [payload: variable]
/// ```
pub fn write_file(version: u16, kind: CacheKind, timestamp_ms: i64, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MIN_HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.push(kind.code());
    buf.extend_from_slice(&timestamp_ms.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn read_array<const N: usize>(data: &[u8], offset: usize, what: &str) -> Result<[u8; N], CoreError> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CoreError::InvalidFileFormat(format!("Failed to read {what}")))
}

/// Parse the header from raw file bytes.
/// Returns the header and the payload slice.
pub fn read_file(data: &[u8]) -> Result<(FileHeader, &[u8]), CoreError> {
    if data.len() < MIN_HEADER_SIZE {
        return Err(CoreError::InvalidFileFormat(
            "File too small to be a valid cache file".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes: not a cache file".into(),
        ));
    }

    let mut offset = 4;

    let version = u16::from_le_bytes(read_array(data, offset, "version")?);
    offset += 2;
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let kind = CacheKind::from_code(data[offset]).ok_or_else(|| {
        CoreError::InvalidFileFormat(format!("Unknown cache kind code {}", data[offset]))
    })?;
    offset += 1;

    let timestamp_ms = i64::from_le_bytes(read_array(data, offset, "timestamp")?);
    offset += 8;

    let payload_len = u64::from_le_bytes(read_array(data, offset, "payload length")?);
    offset += 8;

    let expected_end = usize::try_from(payload_len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| CoreError::InvalidFileFormat("Payload length overflow".into()))?;
    if data.len() < expected_end {
        return Err(CoreError::InvalidFileFormat(format!(
            "File truncated: expected {} bytes of payload, got {}",
            payload_len,
            data.len() - offset
        )));
    }

    let header = FileHeader {
        version,
        kind,
        timestamp_ms,
        payload_len,
    };

    Ok((header, &data[offset..expected_end]))
}
