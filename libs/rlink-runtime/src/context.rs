use crate::constraints::ConstraintTable;
use crate::error::LinkError;
use crate::placeholder::PlaceholderTable;
use crate::resolver::ClassResolver;
use rlink_archive::ArchiveStore;
use rlink_class::LoadedClass;
use rlink_core::{LoaderId, ObjectType, RuntimeConfig};
use rlink_loader::{Loader, LoaderRegistry, RegistryError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug)]
pub struct ContextOptions {
	/// Archive to consult before asking class sources.
	pub archive: Option<PathBuf>,
	/// Configuration the archive has to have been dumped with.
	pub runtime_config: RuntimeConfig,
	/// Keep class files around after linking.
	pub retain_class_bytes: bool,
}

impl Default for ContextOptions {
	fn default() -> Self {
		ContextOptions {
			archive: None,
			runtime_config: RuntimeConfig::host(),
			retain_class_bytes: false,
		}
	}
}

impl ContextOptions {
	pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
		self.archive = Some(path.into());
		self
	}

	pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
		self.runtime_config = config;
		self
	}

	pub fn retain_class_bytes(mut self, retain: bool) -> Self {
		self.retain_class_bytes = retain;
		self
	}
}

/// Everything class loading shares within one runtime. Independent contexts share nothing, so
/// several can live side by side.
pub struct RuntimeLoadingContext {
	registry: LoaderRegistry,
	constraints: ConstraintTable,
	archive: Option<ArchiveStore>,
	placeholders: PlaceholderTable,
	options: ContextOptions,
}

impl RuntimeLoadingContext {
	/// Creates a context, opening the configured archive. An archive that can not be used is
	/// logged and ignored.
	pub fn new(options: ContextOptions) -> RuntimeLoadingContext {
		let archive = options
			.archive
			.as_deref()
			.and_then(|path| ArchiveStore::open_available(path, options.runtime_config));
		RuntimeLoadingContext::with_archive_store(options, archive)
	}

	pub fn with_archive_store(
		options: ContextOptions,
		archive: Option<ArchiveStore>,
	) -> RuntimeLoadingContext {
		info!(
			"Created loading context ({}, archive {})",
			options.runtime_config,
			if archive.is_some() { "on" } else { "off" }
		);
		RuntimeLoadingContext {
			registry: LoaderRegistry::new(),
			constraints: ConstraintTable::new(),
			archive,
			placeholders: PlaceholderTable::new(),
			options,
		}
	}

	pub fn registry(&self) -> &LoaderRegistry {
		&self.registry
	}

	pub fn constraints(&self) -> &ConstraintTable {
		&self.constraints
	}

	pub fn archive(&self) -> Option<&ArchiveStore> {
		self.archive.as_ref()
	}

	pub fn options(&self) -> &ContextOptions {
		&self.options
	}

	pub(crate) fn placeholders(&self) -> &PlaceholderTable {
		&self.placeholders
	}

	pub fn register(&self, loader: Loader) -> Result<Arc<Loader>, RegistryError> {
		self.registry.register(loader)
	}

	pub fn resolver(&self) -> ClassResolver<'_> {
		ClassResolver::new(self)
	}

	/// Resolves and links a class. Accepts `a.b.C` as well as `a/b/C`.
	pub fn resolve(&self, name: &str, loader: LoaderId) -> Result<Arc<LoadedClass>, LinkError> {
		self.resolver().resolve(&ObjectType::from_external(name), loader)
	}

	/// Unloads a leaf loader, its classes, and the constraints it took part in.
	pub fn unload(&self, loader: LoaderId) -> Result<usize, RegistryError> {
		let count = self.registry.unload(loader)?;
		self.constraints.purge_loader(loader);
		Ok(count)
	}
}
