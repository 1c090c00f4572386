use crate::context::RuntimeLoadingContext;
use crate::diagnostics::define_violation;
use crate::error::{ConstraintViolation, LinkError};
use crate::placeholder::{Phase, PlaceholderError, PlaceholderGuard, PlaceholderKey};
use rlink_archive::{ArchiveEntry, ArchiveStore};
use rlink_class::LoadedClass;
use rlink_core::{LoaderId, ObjectType};
use rlink_loader::{Loader, RegistryError};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// Resolves class names to classes on behalf of an initiating loader.
///
/// Lookups go through the delegation chain parent first. A loader that preempts a name cuts the
/// chain off above itself. For every loader that may define the class the archive is asked
/// before any class source, so an archived class never costs a source lookup.
#[derive(Clone, Copy)]
pub struct ClassResolver<'a> {
	pub(crate) context: &'a RuntimeLoadingContext,
}

impl<'a> ClassResolver<'a> {
	pub fn new(context: &'a RuntimeLoadingContext) -> ClassResolver<'a> {
		ClassResolver { context }
	}

	/// Loads and links `name` as seen by `initiating`. Resolving the same name through the same
	/// loader always yields the same class.
	#[instrument(level = "debug", skip_all, fields(class = %name, loader = %initiating))]
	pub fn resolve(
		&self,
		name: &ObjectType,
		initiating: LoaderId,
	) -> Result<Arc<LoadedClass>, LinkError> {
		let class = self.load(name, initiating)?;
		self.link(&class)?;
		Ok(class)
	}

	/// Loads `name` through `initiating` without linking it.
	pub fn load(
		&self,
		name: &ObjectType,
		initiating: LoaderId,
	) -> Result<Arc<LoadedClass>, LinkError> {
		if !ObjectType::is_valid_name(name) {
			return Err(LinkError::NoClassDefFound(format!(
				"Illegal class name \"{}\"",
				name.name
			)));
		}

		let registry = self.context.registry();
		if let Some(class) = registry.find_loaded(initiating, name) {
			trace!("{name} already visible to {initiating}");
			return Ok(class);
		}

		let candidates = self.candidates(name, initiating)?;
		for loader in &candidates {
			if let Some(class) = registry.lookup_defined(loader.id(), name) {
				trace!("{name} already defined by {}", loader.name_and_id());
				return self.initiate(initiating, class);
			}
		}

		if let Some(archive) = self.context.archive() {
			for loader in &candidates {
				let Some(entry) = archive.lookup(name, loader.shape()) else {
					continue;
				};
				if let Some(class) = self.define_archived(loader, archive, entry)? {
					return self.initiate(initiating, class);
				}
			}
		}

		for loader in &candidates {
			if let Some(class) = self.define_from_source(loader, name)? {
				return self.initiate(initiating, class);
			}
		}

		debug!("{name} not found through {initiating}");
		Err(LinkError::NoClassDefFound(name.name.clone()))
	}

	/// The loaders allowed to define `name` for `initiating`, root first.
	fn candidates(
		&self,
		name: &ObjectType,
		initiating: LoaderId,
	) -> Result<Vec<Arc<Loader>>, LinkError> {
		let registry = self.context.registry();
		let mut loaders = Vec::new();
		for id in registry.delegation_chain(initiating) {
			let loader = registry
				.get(id)
				.ok_or(RegistryError::UnknownLoader(id))?;
			let preempts = loader.preempts(name);
			loaders.push(loader);
			if preempts {
				break;
			}
		}

		if loaders.is_empty() {
			return Err(RegistryError::UnknownLoader(initiating).into());
		}
		loaders.reverse();
		Ok(loaders)
	}

	fn define_archived(
		&self,
		loader: &Loader,
		archive: &ArchiveStore,
		entry: &ArchiveEntry,
	) -> Result<Option<Arc<LoadedClass>>, LinkError> {
		let _guard = self.acquire(&entry.name, loader.id(), Phase::Load)?;
		if let Some(class) = self.context.registry().lookup_defined(loader.id(), &entry.name) {
			return Ok(Some(class));
		}

		match archive.materialize(entry, loader.id()) {
			Ok(class) => {
				info!("Loaded class {} in {} from archive", entry.name, loader.name_and_id());
				self.publish(loader, class).map(Some)
			}
			Err(error) => {
				warn!(target: "archive", "Can not use archived {}: {error}", entry.name);
				Ok(None)
			}
		}
	}

	fn define_from_source(
		&self,
		loader: &Loader,
		name: &ObjectType,
	) -> Result<Option<Arc<LoadedClass>>, LinkError> {
		let _guard = self.acquire(name, loader.id(), Phase::Load)?;
		if let Some(class) = self.context.registry().lookup_defined(loader.id(), name) {
			return Ok(Some(class));
		}

		let bytes = loader.supply(name).map_err(|error| LinkError::Source {
			class: name.external_name(),
			loader: loader.name_and_id(),
			message: format!("{error:#}"),
		})?;
		let Some(bytes) = bytes else {
			return Ok(None);
		};

		let class =
			LoadedClass::define(&bytes, loader.id()).map_err(|source| LinkError::ClassFormat {
				class: name.external_name(),
				source,
			})?;
		if class.name != *name {
			return Err(LinkError::NoClassDefFound(format!(
				"{} (wrong name: {})",
				name.name, class.name.name
			)));
		}
		if self.context.options().retain_class_bytes {
			class.retain_bytes(Arc::from(bytes));
		}

		info!("Loaded class {name} in {}", loader.name_and_id());
		self.publish(loader, class).map(Some)
	}

	/// Makes a class visible under its defining loader. No constraint on the name can be added
	/// between the check and the definition becoming visible.
	fn publish(&self, loader: &Loader, class: LoadedClass) -> Result<Arc<LoadedClass>, LinkError> {
		let class = Arc::new(class);
		let registry = self.context.registry();
		self.context
			.constraints()
			.resolve_pending_with(&class.name, loader.id(), &class, || {
				registry.record_definition(loader.id(), class.clone())
			})
			.map_err(|violation| self.define_violation(violation))??;
		Ok(class)
	}

	/// Makes a class defined elsewhere visible to the loader that asked for it.
	fn initiate(
		&self,
		initiating: LoaderId,
		class: Arc<LoadedClass>,
	) -> Result<Arc<LoadedClass>, LinkError> {
		if class.loader == initiating {
			return Ok(class);
		}
		let registry = self.context.registry();
		let seen = self
			.context
			.constraints()
			.resolve_pending_with(&class.name, initiating, &class, || {
				registry.record_initiated(initiating, class.clone())
			})
			.map_err(|violation| self.define_violation(violation))??;
		Ok(seen)
	}

	fn define_violation(&self, violation: ConstraintViolation) -> LinkError {
		let message = define_violation(
			self.context.registry(),
			violation.loader,
			&violation.name,
			violation.other,
		);
		LinkError::LoaderConstraintViolation(violation.with_message(message))
	}

	pub(crate) fn acquire(
		&self,
		name: &str,
		loader: LoaderId,
		phase: Phase,
	) -> Result<PlaceholderGuard<'a>, LinkError> {
		self.context
			.placeholders()
			.acquire(PlaceholderKey::new(name, loader, phase))
			.map_err(|error| match error {
				PlaceholderError::Circularity(key) => {
					LinkError::ClassCircularity(key.name.replace('/', "."))
				}
				PlaceholderError::Deadlock { waiting, held } => LinkError::ResolutionDeadlock {
					waiting: waiting.to_string(),
					held: held.to_string(),
				},
			})
	}
}
