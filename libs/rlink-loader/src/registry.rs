use crate::error::RegistryError;
use crate::loader::Loader;
use ahash::AHashMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rlink_class::LoadedClass;
use rlink_core::LoaderId;
use std::sync::Arc;
use tracing::{debug, info};

struct LoaderNode {
	loader: Arc<Loader>,
	/// Classes this loader defined. The only owning reference the engine keeps to a class.
	defined: DashMap<String, Arc<LoadedClass>>,
	/// Classes handed back to this loader by an ancestor.
	initiated: DashMap<String, Arc<LoadedClass>>,
}

/// The delegation graph plus the classes each loader can see.
///
/// The loader table itself only changes on register and unload. Class maps are sharded per
/// loader so lookups never wait on definitions of unrelated names.
#[derive(Default)]
pub struct LoaderRegistry {
	loaders: RwLock<AHashMap<LoaderId, Arc<LoaderNode>>>,
}

impl LoaderRegistry {
	pub fn new() -> LoaderRegistry {
		LoaderRegistry::default()
	}

	/// Adds a loader. A parent that would close a delegation cycle is rejected before the
	/// duplicate check, so re-registering an existing loader under one of its descendants reports
	/// the cycle.
	pub fn register(&self, loader: Loader) -> Result<Arc<Loader>, RegistryError> {
		let mut guard = self.loaders.write();
		let id = loader.id();

		if let Some(parent) = loader.parent() {
			let mut current = Some(parent);
			while let Some(ancestor) = current {
				if ancestor == id {
					return Err(RegistryError::CyclicDelegation { loader: id, parent });
				}
				current = match guard.get(&ancestor) {
					Some(node) => node.loader.parent(),
					None => return Err(RegistryError::UnknownLoader(ancestor)),
				};
			}
		}

		if guard.contains_key(&id) {
			return Err(RegistryError::DuplicateLoader(id));
		}

		let loader = Arc::new(loader);
		info!("Registered loader {} ({id}) with parent {:?}", loader.name_and_id(), loader.parent());
		guard.insert(
			id,
			Arc::new(LoaderNode {
				loader: loader.clone(),
				defined: DashMap::new(),
				initiated: DashMap::new(),
			}),
		);
		Ok(loader)
	}

	fn node(&self, loader: LoaderId) -> Result<Arc<LoaderNode>, RegistryError> {
		self.loaders
			.read()
			.get(&loader)
			.cloned()
			.ok_or(RegistryError::UnknownLoader(loader))
	}

	pub fn get(&self, loader: LoaderId) -> Option<Arc<Loader>> {
		self.loaders.read().get(&loader).map(|node| node.loader.clone())
	}

	pub fn contains(&self, loader: LoaderId) -> bool {
		self.loaders.read().contains_key(&loader)
	}

	pub fn loaders(&self) -> Vec<Arc<Loader>> {
		let mut loaders: Vec<Arc<Loader>> =
			self.loaders.read().values().map(|node| node.loader.clone()).collect();
		loaders.sort_by_key(|loader| loader.id());
		loaders
	}

	/// Associates a freshly defined class with its defining loader. Defining the same name twice
	/// under one loader is always an error, the first class stays.
	pub fn record_definition(
		&self,
		loader: LoaderId,
		class: Arc<LoadedClass>,
	) -> Result<(), RegistryError> {
		let node = self.node(loader)?;
		let result = match node.defined.entry(class.name.name.clone()) {
			Entry::Occupied(entry) => Err(RegistryError::AlreadyDefined {
				loader,
				name: entry.key().clone(),
			}),
			Entry::Vacant(entry) => {
				debug!("Recorded definition of {} by {loader}", class.name.name);
				entry.insert(class);
				Ok(())
			}
		};
		result
	}

	/// The class `loader` itself defined under `name`. Classes it merely initiated are not
	/// returned.
	pub fn lookup_defined(&self, loader: LoaderId, name: &str) -> Option<Arc<LoadedClass>> {
		let node = self.node(loader).ok()?;
		let class = node.defined.get(name)?;
		Some(class.value().clone())
	}

	/// Remembers that resolving `class` through `loader` returned it. Returns the class the
	/// loader already sees under that name if there is one.
	pub fn record_initiated(
		&self,
		loader: LoaderId,
		class: Arc<LoadedClass>,
	) -> Result<Arc<LoadedClass>, RegistryError> {
		let node = self.node(loader)?;
		if let Some(defined) = node.defined.get(&class.name.name) {
			return Ok(defined.value().clone());
		}
		let entry = node.initiated.entry(class.name.name.clone()).or_insert(class);
		Ok(entry.value().clone())
	}

	/// What `loader` currently sees under `name`, without loading anything.
	pub fn find_loaded(&self, loader: LoaderId, name: &str) -> Option<Arc<LoadedClass>> {
		let node = self.node(loader).ok()?;
		if let Some(class) = node.defined.get(name) {
			return Some(class.value().clone());
		}
		let class = node.initiated.get(name)?;
		Some(class.value().clone())
	}

	pub fn defined_classes(&self, loader: LoaderId) -> Vec<Arc<LoadedClass>> {
		let Ok(node) = self.node(loader) else {
			return vec![];
		};
		let mut classes: Vec<Arc<LoadedClass>> =
			node.defined.iter().map(|entry| entry.value().clone()).collect();
		classes.sort_by(|a, b| a.name.cmp(&b.name));
		classes
	}

	pub fn parent(&self, loader: LoaderId) -> Option<LoaderId> {
		self.loaders.read().get(&loader)?.loader.parent()
	}

	pub fn children(&self, loader: LoaderId) -> Vec<LoaderId> {
		let mut children: Vec<LoaderId> = self
			.loaders
			.read()
			.values()
			.filter(|node| node.loader.parent() == Some(loader))
			.map(|node| node.loader.id())
			.collect();
		children.sort();
		children
	}

	/// `loader`, its parent, and so on up to the root. Calling this again restarts the walk.
	pub fn delegation_chain(&self, loader: LoaderId) -> DelegationChain<'_> {
		DelegationChain {
			registry: self,
			next: self.contains(loader).then_some(loader),
		}
	}

	/// Drops a loader and every class it defined. Loaders with registered children stay.
	pub fn unload(&self, loader: LoaderId) -> Result<usize, RegistryError> {
		let mut guard = self.loaders.write();
		let children = guard
			.values()
			.filter(|node| node.loader.parent() == Some(loader))
			.count();
		if children > 0 {
			return Err(RegistryError::LoaderInUse { loader, children });
		}

		let node = guard.remove(&loader).ok_or(RegistryError::UnknownLoader(loader))?;
		let count = node.defined.len();
		info!("Unloaded {} with {count} classes", node.loader.name_and_id());
		Ok(count)
	}
}

/// Walks parent links upwards. Registration rejects cycles, so the walk always ends.
#[derive(Clone)]
pub struct DelegationChain<'a> {
	registry: &'a LoaderRegistry,
	next: Option<LoaderId>,
}

impl Iterator for DelegationChain<'_> {
	type Item = LoaderId;

	fn next(&mut self) -> Option<LoaderId> {
		let current = self.next?;
		self.next = self.registry.parent(current);
		Some(current)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rlink_reader::ClassWriter;

	fn class(name: &str, loader: LoaderId) -> Arc<LoadedClass> {
		let bytes = ClassWriter::new(name).to_bytes();
		Arc::new(LoadedClass::define(&bytes, loader).unwrap())
	}

	#[test]
	fn chain_walks_to_root() {
		let registry = LoaderRegistry::new();
		let boot = registry.register(Loader::bootstrap()).unwrap();
		let app = registry.register(Loader::app(boot.id())).unwrap();
		let user = registry.register(Loader::user("test/L", Some(app.id()))).unwrap();

		let chain: Vec<LoaderId> = registry.delegation_chain(user.id()).collect();
		assert_eq!(chain, vec![user.id(), app.id(), boot.id()]);

		let chain = registry.delegation_chain(app.id());
		assert_eq!(chain.clone().count(), 2);
		assert_eq!(chain.count(), 2);
		assert_eq!(registry.delegation_chain(LoaderId::next()).count(), 0);
	}

	#[test]
	fn rejects_duplicates_and_unknown_parents() {
		let registry = LoaderRegistry::new();
		let boot = Loader::bootstrap();
		let id = boot.id();
		registry.register(boot).unwrap();
		assert_eq!(
			registry
				.register(Loader::new(id, None, crate::LoaderKind::Bootstrap))
				.map(|_| ()),
			Err(RegistryError::DuplicateLoader(id))
		);

		let missing = LoaderId::next();
		assert_eq!(
			registry.register(Loader::user("test/L", Some(missing))).map(|_| ()),
			Err(RegistryError::UnknownLoader(missing))
		);
	}

	#[test]
	fn rejects_cycles_before_duplicates() {
		let registry = LoaderRegistry::new();
		let p = registry.register(Loader::user("test/P", None)).unwrap();
		let c = registry.register(Loader::user("test/C", Some(p.id()))).unwrap();

		let again = Loader::new(
			p.id(),
			Some(c.id()),
			crate::LoaderKind::User {
				class_name: "test/P".to_string(),
			},
		);
		assert_eq!(
			registry.register(again).map(|_| ()),
			Err(RegistryError::CyclicDelegation {
				loader: p.id(),
				parent: c.id()
			})
		);
	}

	#[test]
	fn definitions_are_unique() {
		let registry = LoaderRegistry::new();
		let boot = registry.register(Loader::bootstrap()).unwrap();
		let first = class("test/C", boot.id());
		registry.record_definition(boot.id(), first.clone()).unwrap();
		assert_eq!(
			registry.record_definition(boot.id(), class("test/C", boot.id())),
			Err(RegistryError::AlreadyDefined {
				loader: boot.id(),
				name: "test/C".to_string()
			})
		);

		let found = registry.lookup_defined(boot.id(), "test/C").unwrap();
		assert!(Arc::ptr_eq(&found, &first));
		assert!(registry.lookup_defined(boot.id(), "test/D").is_none());
	}

	#[test]
	fn initiated_classes_are_visible_but_not_defined() {
		let registry = LoaderRegistry::new();
		let boot = registry.register(Loader::bootstrap()).unwrap();
		let app = registry.register(Loader::app(boot.id())).unwrap();
		let object = class("test/C", boot.id());
		registry.record_definition(boot.id(), object.clone()).unwrap();

		let seen = registry.record_initiated(app.id(), object.clone()).unwrap();
		assert!(Arc::ptr_eq(&seen, &object));
		assert!(registry.lookup_defined(app.id(), "test/C").is_none());
		assert!(Arc::ptr_eq(&registry.find_loaded(app.id(), "test/C").unwrap(), &object));
	}

	#[test]
	fn unload_requires_leaf() {
		let registry = LoaderRegistry::new();
		let boot = registry.register(Loader::bootstrap()).unwrap();
		let user = registry.register(Loader::user("test/L", Some(boot.id()))).unwrap();
		let defined = class("test/C", user.id());
		registry.record_definition(user.id(), defined.clone()).unwrap();
		let weak = Arc::downgrade(&defined);
		drop(defined);

		assert_eq!(
			registry.unload(boot.id()),
			Err(RegistryError::LoaderInUse {
				loader: boot.id(),
				children: 1
			})
		);
		assert_eq!(registry.unload(user.id()), Ok(1));
		assert!(weak.upgrade().is_none());
		assert!(!registry.contains(user.id()));
		assert_eq!(registry.children(boot.id()), vec![]);
	}
}
