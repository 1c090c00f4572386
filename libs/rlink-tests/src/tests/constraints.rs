use crate::testing::*;
use rlink_class::LoadedClass;
use rlink_core::LoaderId;
use rlink_loader::{Loader, MemoryClassSource};
use rlink_runtime::{ConstraintState, ConstraintTable, LinkError};
use std::sync::Arc;

fn foo(loader: LoaderId) -> Arc<LoadedClass> {
	Arc::new(LoadedClass::define(&class("test/Foo"), loader).unwrap())
}

#[test]
fn argument_order_does_not_matter() {
	let (l1, l2) = (LoaderId::next(), LoaderId::next());
	let x = foo(l1);
	let y = foo(l2);
	let choices = [None, Some(&x), Some(&y)];

	for a in choices {
		for b in choices {
			let forward = ConstraintTable::new();
			let backward = ConstraintTable::new();
			let one = forward.add_constraint("test/Foo", l1, a, l2, b, "test");
			let other = backward.add_constraint("test/Foo", l2, b, l1, a, "test");

			assert_eq!(one.is_ok(), other.is_ok(), "{a:?} / {b:?}");
			assert_eq!(
				forward.state("test/Foo", l1),
				backward.state("test/Foo", l1),
				"{a:?} / {b:?}"
			);
		}
	}
}

#[test]
fn merged_sets_are_checked() {
	let (l1, l2, l3) = (LoaderId::next(), LoaderId::next(), LoaderId::next());
	let x = foo(l1);
	let y = foo(l3);

	let table = ConstraintTable::new();
	table.add_constraint("test/Foo", l1, Some(&x), l2, None, "a").unwrap();
	assert_eq!(table.state("test/Foo", l2), Some(ConstraintState::Pending));

	let violation = table
		.add_constraint("test/Foo", l2, None, l3, Some(&y), "b")
		.unwrap_err();
	assert_eq!(violation.name, "test/Foo");

	table.add_constraint("test/Foo", l2, None, l1, Some(&x), "c").unwrap();
	table.resolve_pending("test/Foo", l2, &x).unwrap();
	assert_eq!(table.state("test/Foo", l2), Some(ConstraintState::Satisfied));
}

#[test]
fn definition_against_pending_constraint() {
	let fixture = Fixture::new(MemoryClassSource::new().with("test/Foo", class("test/Foo")));
	let preempting = fixture
		.context
		.register(
			Loader::user("test.PreemptingClassLoader", Some(fixture.app))
				.with_source(MemoryClassSource::new().with("test/Foo", class("test/Foo")))
				.preempting(["test.Foo"]),
		)
		.unwrap();

	let app_foo = fixture.context.resolve("test.Foo", fixture.app).unwrap();
	fixture
		.context
		.constraints()
		.add_constraint("test/Foo", preempting.id(), None, fixture.app, Some(&app_foo), "test")
		.unwrap();

	let error = fixture.context.resolve("test.Foo", preempting.id()).unwrap_err();
	assert_eq!(
		error.to_string(),
		format!(
			"loader constraint violation: loader {} wants to load class test.Foo. \
			 A different class with the same name was previously loaded by 'app'.",
			preempting.name_and_id()
		)
	);
	let LinkError::LoaderConstraintViolation(violation) = error else {
		panic!("unexpected error");
	};
	assert_eq!(violation.loader, preempting.id());
	assert_eq!(violation.other, fixture.app);

	let registry = fixture.context.registry();
	assert!(registry.find_loaded(preempting.id(), "test/Foo").is_none());
}

#[test]
fn initiation_against_pending_constraint() {
	let fixture = Fixture::new(MemoryClassSource::new().with("test/Foo", class("test/Foo")));
	let other = fixture.user_loader(
		"test.Other",
		fixture.bootstrap,
		MemoryClassSource::new().with("test/Foo", class("test/Foo")),
	);
	let child = fixture.user_loader("test.Child", fixture.app, MemoryClassSource::new());

	let other_foo = fixture.context.resolve("test/Foo", other).unwrap();
	fixture
		.context
		.constraints()
		.add_constraint("test/Foo", child, None, other, Some(&other_foo), "test")
		.unwrap();

	let error = fixture.context.resolve("test/Foo", child).unwrap_err();
	assert!(matches!(error, LinkError::LoaderConstraintViolation(_)));
	assert!(fixture.context.registry().find_loaded(child, "test/Foo").is_none());

	// The app loader itself is not constrained.
	let app_foo = fixture.context.resolve("test/Foo", fixture.app).unwrap();
	assert_eq!(app_foo.loader, fixture.app);
}

#[test]
fn unloading_drops_constraints() {
	let fixture = Fixture::new(MemoryClassSource::new().with("test/Foo", class("test/Foo")));
	let child = fixture.user_loader("test.Child", fixture.app, MemoryClassSource::new());
	let app_foo = fixture.context.resolve("test/Foo", fixture.app).unwrap();

	let constraints = fixture.context.constraints();
	constraints
		.add_constraint("test/Foo", child, None, fixture.app, Some(&app_foo), "test")
		.unwrap();
	assert_eq!(constraints.len(), 1);

	fixture.context.unload(child).unwrap();
	assert!(constraints.is_empty());
	assert!(constraints.constraints_for("test/Foo").is_empty());
}
