use crate::testing::*;
use rlink_core::LoaderId;
use rlink_loader::{Loader, LoaderKind, MemoryClassSource, RegistryError};

#[test]
fn cyclic_delegation() {
	let fixture = Fixture::new(MemoryClassSource::new());
	let p = fixture
		.context
		.register(Loader::user("test.P", Some(fixture.app)))
		.unwrap();
	let c = fixture
		.context
		.register(Loader::user("test.C", Some(p.id())))
		.unwrap();

	let again = Loader::new(
		p.id(),
		Some(c.id()),
		LoaderKind::User {
			class_name: "test/P".to_string(),
		},
	);
	assert_eq!(
		fixture.context.register(again).map(|_| ()),
		Err(RegistryError::CyclicDelegation {
			loader: p.id(),
			parent: c.id()
		})
	);
	assert_eq!(fixture.context.registry().parent(p.id()), Some(fixture.app));
}

#[test]
fn unknown_initiating_loader() {
	let fixture = Fixture::new(MemoryClassSource::new());
	let error = fixture
		.context
		.resolve("java/lang/Object", LoaderId::next())
		.unwrap_err();
	assert!(matches!(
		error,
		rlink_runtime::LinkError::Registry(RegistryError::UnknownLoader(_))
	));
}

#[test]
fn unloading_leaf_loader() {
	let fixture = Fixture::new(MemoryClassSource::new());
	let parent = fixture.user_loader(
		"test.Parent",
		fixture.app,
		MemoryClassSource::new().with("test/A", class("test/A")),
	);
	let child = fixture.user_loader(
		"test.Child",
		parent,
		MemoryClassSource::new().with("test/B", class("test/B")),
	);

	let a = fixture.context.resolve("test/A", child).unwrap();
	fixture.context.resolve("test/B", child).unwrap();

	assert_eq!(
		fixture.context.unload(parent),
		Err(RegistryError::LoaderInUse {
			loader: parent,
			children: 1
		})
	);
	assert_eq!(fixture.context.unload(child), Ok(1));
	assert!(!fixture.context.registry().contains(child));

	// Classes defined by the parent are untouched.
	let again = fixture.context.resolve("test/A", parent).unwrap();
	assert!(std::sync::Arc::ptr_eq(&a, &again));
	assert_eq!(fixture.context.unload(parent), Ok(1));
}
