use crate::testing::*;
use rlink_archive::{ArchiveBuilder, ArchiveStore};
use rlink_class::ClassOrigin;
use rlink_core::{FieldAccessFlags, MethodAccessFlags, RuntimeConfig};
use rlink_loader::{Loader, MemoryClassSource};
use rlink_reader::{ClassWriter, CodeBody};
use rlink_runtime::{ContextOptions, RuntimeLoadingContext};
use std::sync::Arc;

fn sample() -> Vec<u8> {
	ClassWriter::new("test/A")
		.interface("test/I")
		.field(FieldAccessFlags::PRIVATE, "count", "J")
		.field(FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC, "NAME", "Ljava/lang/String;")
		.method(MethodAccessFlags::PUBLIC, "<init>", "()V", Some(returns()))
		.method(
			MethodAccessFlags::PUBLIC,
			"run",
			"(ILjava/lang/String;)V",
			Some(CodeBody::new(2, 3, vec![0x1b, 0x57, 0xb1])),
		)
		.to_bytes()
}

fn app_classes() -> MemoryClassSource {
	MemoryClassSource::new()
		.with("test/A", sample())
		.with("test/I", abstract_interface("test/I", "run", "(ILjava/lang/String;)V"))
}

fn archive(config: RuntimeConfig) -> Vec<u8> {
	let mut builder = ArchiveBuilder::new(config);
	builder
		.add_class("bootstrap", &object_class())
		.unwrap()
		.add_class("bootstrap", &class("java/lang/String"))
		.unwrap()
		.add_class("app", &sample())
		.unwrap()
		.add_class("app", &abstract_interface("test/I", "run", "(ILjava/lang/String;)V"))
		.unwrap();
	builder.to_bytes()
}

struct Observed {
	fixture: Fixture,
	bootstrap_calls: Counter,
	app_calls: Counter,
}

fn observe(context: RuntimeLoadingContext) -> Observed {
	let bootstrap = CountingSource::new(system_classes());
	let app = CountingSource::new(app_classes());
	let (bootstrap_calls, app_calls) = (bootstrap.counter(), app.counter());
	Observed {
		fixture: Fixture::with_context(context, bootstrap, app),
		bootstrap_calls,
		app_calls,
	}
}

fn live_shape() -> rlink_class::ClassShape {
	let live = observe(RuntimeLoadingContext::new(ContextOptions::default()));
	let class = live.fixture.context.resolve("test/A", live.fixture.app).unwrap();
	assert_eq!(class.origin, ClassOrigin::Parsed);
	class.shape()
}

#[test]
fn archived_classes_skip_sources() {
	let host = RuntimeConfig::host();
	let store = ArchiveStore::from_bytes(archive(host), host).unwrap();
	let observed = observe(RuntimeLoadingContext::with_archive_store(
		ContextOptions::default(),
		Some(store),
	));

	let fixture = &observed.fixture;
	let class = fixture.context.resolve("test.A", fixture.app).unwrap();
	assert_eq!(class.origin, ClassOrigin::Archived);
	assert_eq!(class.loader, fixture.app);
	assert!(class.is_linked());
	assert_eq!(observed.bootstrap_calls.get(), 0);
	assert_eq!(observed.app_calls.get(), 0);

	let object = class.superface.superclass.as_ref().and_then(|v| v.get()).unwrap();
	assert_eq!(object.loader, fixture.bootstrap);
	assert_eq!(object.origin, ClassOrigin::Archived);

	assert_eq!(class.shape(), live_shape());
}

#[test]
fn archive_from_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("classes.rlca");
	std::fs::write(&path, archive(RuntimeConfig::host())).unwrap();

	let observed = observe(RuntimeLoadingContext::new(
		ContextOptions::default().with_archive(&path),
	));
	let fixture = &observed.fixture;
	assert_eq!(fixture.context.archive().map(|v| v.len()), Some(4));

	let class = fixture.context.resolve("test/A", fixture.app).unwrap();
	assert_eq!(class.origin, ClassOrigin::Archived);
	assert_eq!(observed.app_calls.get(), 0);
}

#[test]
fn corrupt_archive_falls_back() {
	let mut data = archive(RuntimeConfig::host());
	let last = data.len() - 1;
	data[last] ^= 0xff;

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("classes.rlca");
	std::fs::write(&path, data).unwrap();

	let observed = observe(RuntimeLoadingContext::new(
		ContextOptions::default().with_archive(&path),
	));
	let fixture = &observed.fixture;
	assert!(fixture.context.archive().is_none());

	let class = fixture.context.resolve("test/A", fixture.app).unwrap();
	assert_eq!(class.origin, ClassOrigin::Parsed);
	assert!(observed.app_calls.get() > 0);
	assert_eq!(class.shape(), live_shape());
}

#[test]
fn foreign_config_falls_back() {
	let foreign = RuntimeConfig::new(4, false, 0);
	let host = RuntimeConfig::host();
	let config = if foreign == host {
		RuntimeConfig::new(8, true, 3)
	} else {
		foreign
	};

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("classes.rlca");
	std::fs::write(&path, archive(config)).unwrap();

	let observed = observe(RuntimeLoadingContext::new(
		ContextOptions::default().with_archive(&path),
	));
	assert!(observed.fixture.context.archive().is_none());
	let class = observed
		.fixture
		.context
		.resolve("test/A", observed.fixture.app)
		.unwrap();
	assert_eq!(class.origin, ClassOrigin::Parsed);

	// A context configured like the dumping runtime accepts it.
	let matching = RuntimeLoadingContext::new(
		ContextOptions::default()
			.with_archive(&path)
			.with_runtime_config(config),
	);
	assert_eq!(matching.archive().map(|v| v.config()), Some(config));
}

#[test]
fn user_loaders_share_archived_shape() {
	let mut builder = ArchiveBuilder::new(RuntimeConfig::host());
	builder.add_class("test/Plugin", &class("test/P")).unwrap();
	let store = ArchiveStore::from_bytes(builder.to_bytes(), RuntimeConfig::host()).unwrap();
	let fixture = Fixture::with_context(
		RuntimeLoadingContext::with_archive_store(ContextOptions::default(), Some(store)),
		system_classes(),
		MemoryClassSource::new(),
	);

	let plugin = |name: &str| {
		fixture
			.context
			.register(Loader::user("test.Plugin", Some(fixture.app)).with_name(name))
			.unwrap()
			.id()
	};
	let (first, second) = (plugin("first"), plugin("second"));

	let one = fixture.context.resolve("test/P", first).unwrap();
	let other = fixture.context.resolve("test/P", second).unwrap();
	assert_eq!(one.origin, ClassOrigin::Archived);
	assert_eq!(one.loader, first);
	assert_eq!(other.loader, second);
	assert!(!Arc::ptr_eq(&one, &other));

	// Other loader classes do not get it.
	let stranger = fixture.user_loader("test.Stranger", fixture.app, MemoryClassSource::new());
	assert!(fixture.context.resolve("test/P", stranger).is_err());
}
