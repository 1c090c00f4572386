use ahash::AHashMap;
use eyre::Context;
use parking_lot::{Mutex, RwLock};
use rlink_core::ObjectType;
use std::fs::read;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;
use zip::ZipArchive;

/// Supplies class file bytes by internal name. `Ok(None)` means the source does not know the
/// class, errors are reserved for sources that know it but could not produce it.
///
/// A source may block (disk, network) and may call back into the resolver, no engine lock is held
/// while it runs.
pub trait ClassSource: Send + Sync {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>>;
}

impl<S: ClassSource + ?Sized> ClassSource for Arc<S> {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		(**self).try_load(ty)
	}
}

impl<S: ClassSource + ?Sized> ClassSource for Box<S> {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		(**self).try_load(ty)
	}
}

/// Reads `a/b/C.class` below a root directory.
pub struct DirectoryClassSource {
	dir: PathBuf,
}

impl DirectoryClassSource {
	pub fn new(dir: impl Into<PathBuf>) -> DirectoryClassSource {
		DirectoryClassSource { dir: dir.into() }
	}
}

impl ClassSource for DirectoryClassSource {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		let mut path = self.dir.join(PathBuf::from(&**ty));
		path.set_extension("class");

		if path.is_file() {
			let vec = read(&path).wrap_err_with(|| format!("Reading {}", path.display()))?;
			return Ok(Some(vec));
		}

		Ok(None)
	}
}

pub struct JarClassSource {
	file_lookup: AHashMap<String, usize>,
	archive: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
}

impl JarClassSource {
	pub fn new(data: Vec<u8>) -> eyre::Result<JarClassSource> {
		let reader = Cursor::new(data);
		let mut archive: ZipArchive<Cursor<Vec<u8>>> =
			ZipArchive::new(reader).wrap_err("Not a jar file")?;

		let mut file_lookup = AHashMap::new();
		for index in 0..archive.len() {
			let file = archive.by_index(index)?;
			let file_name = file.name();
			if file.is_file() && file_name.ends_with(".class") {
				trace!("jar entry {file_name}");
				file_lookup.insert(file_name.trim_end_matches(".class").to_string(), index);
			}
		}

		Ok(JarClassSource {
			file_lookup,
			archive: Mutex::new(archive),
		})
	}

	pub fn open(path: &Path) -> eyre::Result<JarClassSource> {
		let data = read(path).wrap_err_with(|| format!("Reading {}", path.display()))?;
		JarClassSource::new(data).wrap_err_with(|| format!("Opening jar {}", path.display()))
	}

	pub fn len(&self) -> usize {
		self.file_lookup.len()
	}

	pub fn is_empty(&self) -> bool {
		self.file_lookup.is_empty()
	}
}

impl ClassSource for JarClassSource {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		if let Some(file_location) = self.file_lookup.get(&**ty) {
			let mut guard = self.archive.lock();
			let mut file = guard.by_index(*file_location)?;

			let mut data = Vec::with_capacity(file.size() as usize);
			file.read_to_end(&mut data)?;
			return Ok(Some(data));
		}

		Ok(None)
	}
}

/// Classes held in memory, for synthesised classes and tests.
#[derive(Default)]
pub struct MemoryClassSource {
	classes: RwLock<AHashMap<String, Arc<[u8]>>>,
}

impl MemoryClassSource {
	pub fn new() -> MemoryClassSource {
		MemoryClassSource::default()
	}

	pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
		self.classes.write().insert(name.into(), bytes.into());
	}

	pub fn with(self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
		self.insert(name, bytes);
		self
	}

	pub fn remove(&self, name: &str) -> bool {
		self.classes.write().remove(name).is_some()
	}
}

impl ClassSource for MemoryClassSource {
	fn try_load(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		Ok(self.classes.read().get(&**ty).map(|bytes| bytes.to_vec()))
	}
}
