use crate::LoadedClass;
use rlink_core::{LoaderId, ObjectType};
use std::sync::{Arc, OnceLock, Weak};

/// This holds the references to the superclass and the interfaces.
///
/// The references are filled in during linking and never own the supertype. The defining loader's
/// registry entry is what keeps a supertype alive.
pub struct ClassSuperface {
	pub superclass: Option<Superface>,
	pub interfaces: Vec<Superface>,
}

impl ClassSuperface {
	pub fn new(superclass: Option<ObjectType>, interfaces: Vec<ObjectType>) -> ClassSuperface {
		ClassSuperface {
			superclass: superclass.map(Superface::new),
			interfaces: interfaces.into_iter().map(Superface::new).collect(),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &Superface> {
		self.superclass.iter().chain(self.interfaces.iter())
	}

	pub fn names(&self) -> impl Iterator<Item = &ObjectType> {
		self.iter().map(|superface| &superface.ty)
	}
}

pub struct Superface {
	pub ty: ObjectType,
	resolved: OnceLock<ResolvedSuper>,
}

struct ResolvedSuper {
	loader: LoaderId,
	class: Weak<LoadedClass>,
}

impl Superface {
	pub fn new(ty: ObjectType) -> Superface {
		Superface {
			ty,
			resolved: OnceLock::new(),
		}
	}

	/// Records the class this reference resolved to. The first resolution wins, a later
	/// call with a different class returns `false`.
	pub fn resolve(&self, class: &Arc<LoadedClass>) -> bool {
		let resolved = self.resolved.get_or_init(|| ResolvedSuper {
			loader: class.loader,
			class: Arc::downgrade(class),
		});
		resolved.class.as_ptr() == Arc::as_ptr(class)
	}

	pub fn is_resolved(&self) -> bool {
		self.resolved.get().is_some()
	}

	/// The defining loader of the resolved supertype.
	pub fn loader(&self) -> Option<LoaderId> {
		self.resolved.get().map(|v| v.loader)
	}

	/// `None` before linking, or once the supertype's loader has been unloaded.
	pub fn get(&self) -> Option<Arc<LoadedClass>> {
		self.resolved.get()?.class.upgrade()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rlink_reader::ClassWriter;

	fn class(loader: LoaderId) -> Arc<LoadedClass> {
		Arc::new(LoadedClass::define(&ClassWriter::new("test/Base").to_bytes(), loader).unwrap())
	}

	#[test]
	fn first_resolution_wins() {
		let superface = Superface::new(ObjectType::new("test/Base"));
		assert!(!superface.is_resolved());

		let (a, b) = (LoaderId::next(), LoaderId::next());
		let first = class(a);
		assert!(superface.resolve(&first));
		assert!(superface.resolve(&first));
		assert!(!superface.resolve(&class(b)));

		assert_eq!(superface.loader(), Some(a));
		assert!(Arc::ptr_eq(&superface.get().unwrap(), &first));
		drop(first);
		assert!(superface.get().is_none());
	}
}
