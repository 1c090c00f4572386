use crate::source::ClassSource;
use ahash::AHashSet;
use eyre::Context;
use rlink_core::{LoaderId, ObjectType};
use std::fmt::{Debug, Formatter};

/// The kind of a loader. Archives are keyed by [`Loader::shape`], which is derived from this.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LoaderKind {
	Bootstrap,
	App,
	/// A loader implemented by user code, identified by the internal name of its loader class.
	User { class_name: String },
}

pub struct Loader {
	id: LoaderId,
	parent: Option<LoaderId>,
	kind: LoaderKind,
	name: Option<String>,
	sources: Vec<Box<dyn ClassSource>>,
	/// Classes this loader defines itself before asking its parent.
	preempt: AHashSet<String>,
}

impl Loader {
	pub fn new(id: LoaderId, parent: Option<LoaderId>, kind: LoaderKind) -> Loader {
		Loader {
			id,
			parent,
			kind,
			name: None,
			sources: vec![],
			preempt: AHashSet::new(),
		}
	}

	pub fn bootstrap() -> Loader {
		Loader::new(LoaderId::next(), None, LoaderKind::Bootstrap)
	}

	pub fn app(parent: LoaderId) -> Loader {
		Loader::new(LoaderId::next(), Some(parent), LoaderKind::App)
	}

	pub fn user(class_name: impl Into<String>, parent: Option<LoaderId>) -> Loader {
		let class_name = class_name.into().replace('.', "/");
		Loader::new(LoaderId::next(), parent, LoaderKind::User { class_name })
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_source(mut self, source: impl ClassSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	pub fn preempting<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.preempt
			.extend(names.into_iter().map(|name| name.into().replace('.', "/")));
		self
	}

	pub fn id(&self) -> LoaderId {
		self.id
	}

	pub fn parent(&self) -> Option<LoaderId> {
		self.parent
	}

	pub fn kind(&self) -> &LoaderKind {
		&self.kind
	}

	pub fn name(&self) -> Option<&str> {
		match &self.kind {
			LoaderKind::Bootstrap => Some("bootstrap"),
			LoaderKind::App => Some("app"),
			LoaderKind::User { .. } => self.name.as_deref(),
		}
	}

	pub fn is_builtin(&self) -> bool {
		!matches!(self.kind, LoaderKind::User { .. })
	}

	/// The loader class this loader is an instance of. Two loaders of the same shape get the same
	/// archived classes.
	pub fn shape(&self) -> &str {
		match &self.kind {
			LoaderKind::Bootstrap => "bootstrap",
			LoaderKind::App => "app",
			LoaderKind::User { class_name } => class_name,
		}
	}

	pub fn preempts(&self, ty: &ObjectType) -> bool {
		self.preempt.contains(&**ty)
	}

	/// How the loader shows up in diagnostics: `'app'` for builtin loaders,
	/// `'name' @1f` or `pkg.LoaderClass @1f` for user loaders.
	pub fn name_and_id(&self) -> String {
		match (&self.kind, &self.name) {
			(LoaderKind::Bootstrap | LoaderKind::App, _) => {
				format!("'{}'", self.name().unwrap_or_default())
			}
			(LoaderKind::User { .. }, Some(name)) => {
				format!("'{name}' @{:x}", self.id.identity_hash())
			}
			(LoaderKind::User { class_name }, None) => {
				format!("{} @{:x}", class_name.replace('/', "."), self.id.identity_hash())
			}
		}
	}

	/// Asks every source in order, the first one that knows the class wins.
	pub fn supply(&self, ty: &ObjectType) -> eyre::Result<Option<Vec<u8>>> {
		for source in &self.sources {
			let data = source
				.try_load(ty)
				.wrap_err_with(|| format!("Failed to load {} from source", &**ty))?;
			if data.is_some() {
				return Ok(data);
			}
		}

		Ok(None)
	}
}

impl Debug for Loader {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Loader")
			.field("id", &self.id)
			.field("parent", &self.parent)
			.field("kind", &self.kind)
			.field("sources", &self.sources.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MemoryClassSource;

	#[test]
	fn names_follow_kind() {
		let boot = Loader::bootstrap();
		assert_eq!(boot.name_and_id(), "'bootstrap'");
		let app = Loader::app(boot.id());
		assert_eq!(app.name_and_id(), "'app'");
		assert!(app.is_builtin());

		let user = Loader::user("test.PreemptingClassLoader", Some(app.id()));
		let rendered = user.name_and_id();
		assert!(rendered.starts_with("test.PreemptingClassLoader @"));
		assert_eq!(user.shape(), "test/PreemptingClassLoader");

		let named = Loader::user("test/Custom", None).with_name("plugins");
		assert!(named.name_and_id().starts_with("'plugins' @"));
	}

	#[test]
	fn supply_asks_sources_in_order() {
		let first = MemoryClassSource::new().with("test/A", vec![1u8]);
		let second = MemoryClassSource::new()
			.with("test/A", vec![2u8])
			.with("test/B", vec![3u8]);
		let loader = Loader::bootstrap().with_source(first).with_source(second);

		assert_eq!(loader.supply(&ObjectType::new("test/A")).unwrap(), Some(vec![1]));
		assert_eq!(loader.supply(&ObjectType::new("test/B")).unwrap(), Some(vec![3]));
		assert_eq!(loader.supply(&ObjectType::new("test/C")).unwrap(), None);
	}

	#[test]
	fn preempt_names_accept_both_forms() {
		let loader = Loader::user("test/L", None).preempting(["test.Foo", "test/Bar"]);
		assert!(loader.preempts(&ObjectType::new("test/Foo")));
		assert!(loader.preempts(&ObjectType::new("test/Bar")));
		assert!(!loader.preempts(&ObjectType::new("test/Baz")));
	}
}
