//! On-disk record encoding
//!
//! Records are stored as self-describing MessagePack maps (field names
//! included), so payload documents decode back into the same JSON shape
//! and new record fields can be added without a format version.

use crate::error::Result;
use crate::types::SessionRecord;

/// Encode a record for storage
pub fn encode_record(record: &SessionRecord) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(record)?)
}

/// Decode a stored record
///
/// Undecodable bytes surface as `EngineFailure` (corruption).
pub fn decode_record(bytes: &[u8]) -> Result<SessionRecord> {
    Ok(rmp_serde::from_slice(bytes)?)
}
