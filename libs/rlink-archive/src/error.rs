use rlink_core::RuntimeConfig;
use thiserror::Error;

/// Every way an archive can be unusable. None of these are fatal to the runtime, a class that
/// can not come from the archive is loaded from its source instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("Archive was dumped with {archived}, the runtime uses {expected}")]
	ConfigMismatch {
		archived: RuntimeConfig,
		expected: RuntimeConfig,
	},
	#[error("Archive is corrupt: {0}")]
	Corrupt(String),
	#[error("Unsupported archive version {0}")]
	UnsupportedVersion(u16),
	#[error("Could not read archive")]
	Io(#[from] std::io::Error),
}
