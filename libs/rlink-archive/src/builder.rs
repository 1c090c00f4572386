use crate::header::{seal, ArchiveHeader, ARCHIVE_VERSION, HEADER_LEN};
use crate::record::{put_str, put_u32, ClassRecord};
use eyre::{bail, Context};
use rlink_class::ClassParts;
use rlink_core::RuntimeConfig;
use std::path::Path;
use tracing::debug;

/// Writes archives from class files. Every class is parsed and verified before it is archived.
pub struct ArchiveBuilder {
	config: RuntimeConfig,
	classes: Vec<(String, ClassParts)>,
}

impl ArchiveBuilder {
	pub fn new(config: RuntimeConfig) -> ArchiveBuilder {
		ArchiveBuilder {
			config,
			classes: vec![],
		}
	}

	/// Archives a class for loaders of `loader_shape`.
	pub fn add_class(&mut self, loader_shape: &str, bytes: &[u8]) -> eyre::Result<&mut Self> {
		let parts = ClassParts::parse(bytes).wrap_err("Class can not be archived")?;
		if self
			.classes
			.iter()
			.any(|(shape, other)| shape == loader_shape && other.name == parts.name)
		{
			bail!("{} is already archived for {loader_shape}", parts.name.name);
		}

		debug!(target: "archive", "Archiving {} for {loader_shape}", parts.name.name);
		self.classes.push((loader_shape.to_string(), parts));
		Ok(self)
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let records: Vec<Vec<u8>> = self
			.classes
			.iter()
			.map(|(_, parts)| {
				let mut record = vec![];
				ClassRecord::write(parts, &mut record);
				record
			})
			.collect();

		let table_len: usize = self
			.classes
			.iter()
			.map(|(shape, parts)| 2 + parts.name.len() + 2 + shape.len() + 12)
			.sum();

		let mut output = Vec::new();
		ArchiveHeader {
			version: ARCHIVE_VERSION,
			config: self.config.to_bytes(),
			entry_count: self.classes.len() as u32,
			checksum: 0,
		}
		.write(&mut output);

		let mut offset = HEADER_LEN + table_len;
		for ((shape, parts), record) in self.classes.iter().zip(&records) {
			put_str(&mut output, &parts.name);
			put_str(&mut output, shape);
			put_u32(&mut output, offset as u32);
			put_u32(&mut output, record.len() as u32);
			put_u32(&mut output, parts.checksum);
			offset += record.len();
		}

		for record in &records {
			output.extend_from_slice(record);
		}

		seal(&mut output);
		output
	}

	pub fn write(&self, path: &Path) -> eyre::Result<()> {
		std::fs::write(path, self.to_bytes())
			.wrap_err_with(|| format!("Writing archive {}", path.display()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ArchiveError, ArchiveStore};
	use rlink_class::LoadedClass;
	use rlink_core::{LoaderId, MethodAccessFlags};
	use rlink_reader::{ClassWriter, CodeBody};

	fn class_bytes(name: &str) -> Vec<u8> {
		ClassWriter::new(name)
			.interface("test/I")
			.field(rlink_core::FieldAccessFlags::PUBLIC, "value", "[J")
			.method(
				MethodAccessFlags::PUBLIC,
				"get",
				"(Ljava/lang/String;)Ltest/Foo;",
				Some(CodeBody::new(2, 2, vec![0x01, 0xb0])),
			)
			.method(
				MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
				"run",
				"()V",
				None,
			)
			.to_bytes()
	}

	fn archive(config: RuntimeConfig) -> Vec<u8> {
		let mut builder = ArchiveBuilder::new(config);
		builder.add_class("app", &class_bytes("test/A")).unwrap();
		builder.add_class("app", &class_bytes("test/B")).unwrap();
		builder.add_class("bootstrap", &class_bytes("test/A")).unwrap();
		builder.to_bytes()
	}

	#[test]
	fn lookup_is_keyed_by_shape() {
		let config = RuntimeConfig::new(8, true, 3);
		let store = ArchiveStore::from_bytes(archive(config), config).unwrap();
		assert_eq!(store.len(), 3);
		assert!(store.lookup("test/A", "app").is_some());
		assert!(store.lookup("test/B", "bootstrap").is_none());
		assert!(store.lookup("test/C", "app").is_none());
		assert_eq!(store.entries()[0].loader_shape, "app");
	}

	#[test]
	fn materialized_class_matches_parsed_class() {
		let config = RuntimeConfig::new(8, true, 3);
		let store = ArchiveStore::from_bytes(archive(config), config).unwrap();
		let loader = LoaderId::next();

		let entry = store.lookup("test/B", "app").unwrap();
		let archived = store.materialize(entry, loader).unwrap();
		let parsed = LoadedClass::define(&class_bytes("test/B"), loader).unwrap();
		assert_eq!(archived.shape(), parsed.shape());
		assert_eq!(archived.checksum, parsed.checksum);
		assert_eq!(entry.source_checksum, rlink_class::class_checksum(&class_bytes("test/B")));
	}

	#[test]
	fn rejects_other_configs() {
		let archived = RuntimeConfig::new(8, true, 3);
		let live = RuntimeConfig::new(8, false, 0);
		let error = ArchiveStore::from_bytes(archive(archived), live).err().unwrap();
		assert!(matches!(error, ArchiveError::ConfigMismatch { .. }));
	}

	#[test]
	fn rejects_damage() {
		let config = RuntimeConfig::new(8, true, 3);
		let mut data = archive(config);
		let last = data.len() - 1;
		data[last] ^= 0x55;
		let error = ArchiveStore::from_bytes(data, config).err().unwrap();
		assert!(matches!(error, ArchiveError::Corrupt(_)));

		let mut data = archive(config);
		data[0] = b'X';
		assert!(matches!(
			ArchiveStore::from_bytes(data, config),
			Err(ArchiveError::Corrupt(_))
		));

		let data = archive(config);
		assert!(matches!(
			ArchiveStore::from_bytes(data[..10].to_vec(), config),
			Err(ArchiveError::Corrupt(_))
		));

		let mut data = archive(config);
		data[5] = 9;
		assert!(matches!(
			ArchiveStore::from_bytes(data, config),
			Err(ArchiveError::UnsupportedVersion(9))
		));
	}

	#[test]
	fn duplicate_classes_are_refused() {
		let mut builder = ArchiveBuilder::new(RuntimeConfig::host());
		builder.add_class("app", &class_bytes("test/A")).unwrap();
		assert!(builder.add_class("app", &class_bytes("test/A")).is_err());
		assert!(builder.add_class("app", b"not a class").is_err());
		assert_eq!(builder.len(), 1);
	}

	#[test]
	fn open_maps_files() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("classes.rla");
		let mut builder = ArchiveBuilder::new(RuntimeConfig::host());
		builder.add_class("app", &class_bytes("test/A")).unwrap();
		builder.write(&path).unwrap();

		let store = ArchiveStore::open(&path, RuntimeConfig::host()).unwrap();
		assert_eq!(store.config(), RuntimeConfig::host());
		let entry = store.lookup("test/A", "app").unwrap().clone();
		let class = store.materialize(&entry, LoaderId::next()).unwrap();
		drop(store);
		// Method bodies keep the mapping alive after the store is gone.
		let method = class.methods.find("get", "(Ljava/lang/String;)Ltest/Foo;").unwrap();
		assert_eq!(method.code.as_ref().unwrap().bytes.as_slice(), &[0x01, 0xb0]);

		assert!(ArchiveStore::open_available(&dir.path().join("missing.rla"), RuntimeConfig::host()).is_none());
		assert!(matches!(
			ArchiveStore::open(&dir.path().join("missing.rla"), RuntimeConfig::host()),
			Err(ArchiveError::Io(_))
		));
	}
}
