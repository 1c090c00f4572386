mod instance;
mod verify;

pub use instance::*;
pub use verify::*;

/// Checksum recorded for the bytes a class was defined from. Archive entries carry the same value,
/// so a class materialized from an archive can be matched against its original bytes.
pub fn class_checksum(bytes: &[u8]) -> u32 {
	crc32fast::hash(bytes)
}
