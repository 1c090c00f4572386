use crate::error::ArchiveError;
use crate::header::{archive_checksum, ArchiveHeader, ARCHIVE_VERSION, HEADER_LEN};
use crate::record::{be_str, ClassRecord};
use ahash::AHashMap;
use nom::error::context;
use nom::multi::count;
use nom::number::complete::be_u32;
use memmap2::Mmap;
use rlink_class::{LoadedClass, SharedBytes};
use rlink_core::{LoaderId, RuntimeConfig};
use rlink_reader::{format_error, IResult};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One archived class. Entries are keyed by class name and the shape of the loader that defined
/// the class at dump time, never by a loader instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveEntry {
	pub name: String,
	pub loader_shape: String,
	/// Absolute offset of the class record.
	pub offset: u32,
	pub length: u32,
	/// Checksum of the class file the record was produced from.
	pub source_checksum: u32,
}

impl ArchiveEntry {
	fn parse(input: &[u8]) -> IResult<'_, ArchiveEntry> {
		let (input, name) = context("Entry name", be_str)(input)?;
		let (input, loader_shape) = context("Entry loader shape", be_str)(input)?;
		let (input, offset) = be_u32(input)?;
		let (input, length) = be_u32(input)?;
		let (input, source_checksum) = be_u32(input)?;

		Ok((
			input,
			ArchiveEntry {
				name,
				loader_shape,
				offset,
				length,
				source_checksum,
			},
		))
	}

	fn range(&self) -> std::ops::Range<usize> {
		self.offset as usize..self.offset as usize + self.length as usize
	}
}

/// An opened archive. Immutable after [`ArchiveStore::open`], so lookups need no locking.
pub struct ArchiveStore {
	data: SharedBytes,
	config: RuntimeConfig,
	/// Loader shape, then class name.
	entries: AHashMap<String, AHashMap<String, ArchiveEntry>>,
}

impl ArchiveStore {
	/// Maps an archive read-only and validates it. Every materialized method body points into the
	/// mapping.
	pub fn open(path: &Path, expected: RuntimeConfig) -> Result<ArchiveStore, ArchiveError> {
		let file = File::open(path)?;
		// SAFETY: archives are written once by the builder and never modified while mapped.
		let map = unsafe { Mmap::map(&file)? };
		let store = ArchiveStore::from_shared(Arc::new(map), expected)?;
		info!(target: "archive", "Opened archive {} with {} classes", path.display(), store.len());
		Ok(store)
	}

	/// [`ArchiveStore::open`], but an unusable archive is logged and reported as absent.
	pub fn open_available(path: &Path, expected: RuntimeConfig) -> Option<ArchiveStore> {
		match ArchiveStore::open(path, expected) {
			Ok(store) => Some(store),
			Err(error) => {
				warn!(target: "archive", "Archive {} is unavailable: {error}", path.display());
				None
			}
		}
	}

	/// An archive that is already in memory.
	pub fn from_bytes(
		data: impl AsRef<[u8]> + Send + Sync + 'static,
		expected: RuntimeConfig,
	) -> Result<ArchiveStore, ArchiveError> {
		ArchiveStore::from_shared(Arc::new(data), expected)
	}

	fn from_shared(data: SharedBytes, expected: RuntimeConfig) -> Result<ArchiveStore, ArchiveError> {
		let bytes: &[u8] = (*data).as_ref();
		if bytes.len() < HEADER_LEN {
			return Err(ArchiveError::Corrupt(format!(
				"{} bytes is too short for a header",
				bytes.len()
			)));
		}

		let (input, header) = ArchiveHeader::parse(bytes).map_err(|error| corrupt(error, bytes))?;
		if header.version != ARCHIVE_VERSION {
			return Err(ArchiveError::UnsupportedVersion(header.version));
		}

		let checksum = archive_checksum(bytes);
		if checksum != header.checksum {
			return Err(ArchiveError::Corrupt(format!(
				"checksum is {checksum:08x}, header says {:08x}",
				header.checksum
			)));
		}

		let archived = RuntimeConfig::from_bytes(header.config).ok_or_else(|| {
			ArchiveError::Corrupt(format!("invalid runtime config {:?}", header.config))
		})?;
		if archived != expected {
			return Err(ArchiveError::ConfigMismatch { archived, expected });
		}

		let (input, list) =
			context("Entries", count(ArchiveEntry::parse, header.entry_count as usize))(input)
				.map_err(|error| corrupt(error, bytes))?;
		debug!(target: "archive", "Entry table ends at {}", bytes.len() - input.len());

		let mut entries: AHashMap<String, AHashMap<String, ArchiveEntry>> = AHashMap::new();
		for entry in list {
			let record = bytes.get(entry.range()).ok_or_else(|| {
				ArchiveError::Corrupt(format!("entry {} points outside the archive", entry.name))
			})?;
			let (rest, parsed) = ClassRecord::parse(record, entry.offset as usize)
				.map_err(|error| corrupt(error, bytes))?;
			if !rest.is_empty() || parsed.name() != entry.name {
				return Err(ArchiveError::Corrupt(format!(
					"record of {} does not match its entry",
					entry.name
				)));
			}

			let by_name = entries.entry(entry.loader_shape.clone()).or_default();
			if by_name.insert(entry.name.clone(), entry.clone()).is_some() {
				return Err(ArchiveError::Corrupt(format!(
					"{} is archived twice for loader {}",
					entry.name, entry.loader_shape
				)));
			}
		}

		Ok(ArchiveStore {
			data,
			config: archived,
			entries,
		})
	}

	pub fn lookup(&self, name: &str, loader_shape: &str) -> Option<&ArchiveEntry> {
		self.entries.get(loader_shape)?.get(name)
	}

	/// Expands an entry into an unlinked class defined by `loader`. Method bodies stay in the
	/// archive buffer.
	pub fn materialize(
		&self,
		entry: &ArchiveEntry,
		loader: LoaderId,
	) -> Result<LoadedClass, ArchiveError> {
		let record = self.bytes().get(entry.range()).ok_or_else(|| {
			ArchiveError::Corrupt(format!("entry {} points outside the archive", entry.name))
		})?;
		let (_, record) = ClassRecord::parse(record, entry.offset as usize)
			.map_err(|error| corrupt(error, self.bytes()))?;
		let parts = record.to_parts(&self.data, entry.source_checksum)?;

		debug!(target: "archive", "Materialized {} for {loader}", entry.name);
		Ok(LoadedClass::from_parts(parts, loader))
	}

	fn bytes(&self) -> &[u8] {
		(*self.data).as_ref()
	}

	pub fn config(&self) -> RuntimeConfig {
		self.config
	}

	pub fn len(&self) -> usize {
		self.entries.values().map(|v| v.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// All entries, ordered by loader shape and name.
	pub fn entries(&self) -> Vec<&ArchiveEntry> {
		let mut entries: Vec<&ArchiveEntry> =
			self.entries.values().flat_map(|v| v.values()).collect();
		entries.sort_by(|a, b| (&a.loader_shape, &a.name).cmp(&(&b.loader_shape, &b.name)));
		entries
	}
}

fn corrupt(error: nom::Err<nom::error::VerboseError<&[u8]>>, data: &[u8]) -> ArchiveError {
	match error {
		nom::Err::Error(error) | nom::Err::Failure(error) => {
			ArchiveError::Corrupt(format!("{:#}", format_error(error, data)))
		}
		nom::Err::Incomplete(_) => ArchiveError::Corrupt("archive is truncated".to_string()),
	}
}
