use rlink_core::{LoaderId, MethodAccessFlags};
use rlink_loader::{ClassSource, Loader, MemoryClassSource};
use rlink_reader::{ClassWriter, CodeBody};
use rlink_runtime::{ContextOptions, RuntimeLoadingContext};
use std::sync::{Arc, OnceLock, Weak};

mod source;

pub use source::*;

/// A context with a bootstrap loader and an app loader below it.
pub struct Fixture {
	pub context: Arc<RuntimeLoadingContext>,
	pub bootstrap: LoaderId,
	pub app: LoaderId,
}

impl Fixture {
	/// Bootstrap serves the system classes, `app` everything else.
	pub fn new(app: impl ClassSource + 'static) -> Fixture {
		Fixture::with_context(
			RuntimeLoadingContext::new(ContextOptions::default()),
			system_classes(),
			app,
		)
	}

	pub fn with_context(
		context: RuntimeLoadingContext,
		bootstrap: impl ClassSource + 'static,
		app: impl ClassSource + 'static,
	) -> Fixture {
		rlink_core::init();
		let context = Arc::new(context);
		let bootstrap = context
			.register(Loader::bootstrap().with_source(bootstrap))
			.expect("bootstrap loader");
		let app = context
			.register(Loader::app(bootstrap.id()).with_source(app))
			.expect("app loader");

		Fixture {
			context,
			bootstrap: bootstrap.id(),
			app: app.id(),
		}
	}

	/// Registers a user loader of class `class_name` below `parent`.
	pub fn user_loader(
		&self,
		class_name: &str,
		parent: LoaderId,
		source: impl ClassSource + 'static,
	) -> LoaderId {
		self.context
			.register(Loader::user(class_name, Some(parent)).with_source(source))
			.expect("user loader")
			.id()
	}
}

/// Lets class sources call back into the context that owns them.
#[derive(Clone, Default)]
pub struct ContextHandle(Arc<OnceLock<Weak<RuntimeLoadingContext>>>);

impl ContextHandle {
	pub fn set(&self, context: &Arc<RuntimeLoadingContext>) {
		let _ = self.0.set(Arc::downgrade(context));
	}

	pub fn get(&self) -> Arc<RuntimeLoadingContext> {
		self.0
			.get()
			.and_then(Weak::upgrade)
			.expect("context is gone")
	}
}

pub fn system_classes() -> MemoryClassSource {
	MemoryClassSource::new()
		.with("java/lang/Object", object_class())
		.with("java/lang/String", class("java/lang/String"))
}

pub fn object_class() -> Vec<u8> {
	ClassWriter::new("java/lang/Object")
		.no_super()
		.method(MethodAccessFlags::PUBLIC, "<init>", "()V", Some(returns()))
		.to_bytes()
}

pub fn class(name: &str) -> Vec<u8> {
	ClassWriter::new(name).to_bytes()
}

/// An interface with one abstract method.
pub fn abstract_interface(name: &str, method: &str, descriptor: &str) -> Vec<u8> {
	ClassWriter::new_interface(name)
		.method(
			MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
			method,
			descriptor,
			None,
		)
		.to_bytes()
}

/// An interface extending `parent` with one default method.
pub fn default_interface(
	name: &str,
	parent: Option<&str>,
	method: &str,
	descriptor: &str,
) -> Vec<u8> {
	let mut writer = ClassWriter::new_interface(name).method(
		MethodAccessFlags::PUBLIC,
		method,
		descriptor,
		Some(returns_null()),
	);
	if let Some(parent) = parent {
		writer = writer.interface(parent);
	}
	writer.to_bytes()
}

/// `return;`
pub fn returns() -> CodeBody {
	CodeBody::new(0, 1, vec![0xb1])
}

/// `return null;`
pub fn returns_null() -> CodeBody {
	CodeBody::new(1, 1, vec![0x01, 0xb0])
}
