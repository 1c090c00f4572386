use crate::diagnostics::itable_violation;
use crate::error::LinkError;
use crate::resolver::ClassResolver;
use rlink_class::{LoadedClass, Method, Superface};
use rlink_core::MethodAccessFlags;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

impl ClassResolver<'_> {
	/// For every interface method the class ends up implementing, the loader of the interface and
	/// the loader of the selected implementation have to agree on every class in the signature.
	pub(crate) fn check_itable(&self, class: &Arc<LoadedClass>) -> Result<(), LinkError> {
		let interfaces = all_interfaces(class);
		for interface in &interfaces {
			for method in interface.methods.iter() {
				if method.is_static() || method.is_private() || method.is_initializer() {
					continue;
				}
				let Some(holder) = select_method(class, &interfaces, method)? else {
					continue;
				};
				if holder.loader != interface.loader {
					self.check_signature_loaders(class, interface, method, &holder)?;
				}
			}
		}
		Ok(())
	}

	fn check_signature_loaders(
		&self,
		class: &LoadedClass,
		interface: &LoadedClass,
		method: &Method,
		holder: &LoadedClass,
	) -> Result<(), LinkError> {
		let registry = self.context.registry();
		let context = format!(
			"{}.{}{} selected from {}",
			interface.name, method.name, method.desc, holder.name
		);
		for ty in method.desc.referenced_classes() {
			trace!(target: "constraints", "{context}: {ty} in {} and {}", interface.loader, holder.loader);

			// What each loader sees is read under the constraint's own lock, so a class published
			// concurrently is either seen here or checked against the new constraint.
			if let Err(violation) = self.context.constraints().add_constraint_with(
				ty,
				interface.loader,
				holder.loader,
				&context,
				|loader| registry.find_loaded(loader, ty),
			) {
				let message = itable_violation(registry, class, interface, method, holder, ty);
				return Err(LinkError::LoaderConstraintViolation(
					violation.with_message(message),
				));
			}
		}
		Ok(())
	}
}

/// The class an invocation of `method` on an instance of `class` would run, `None` when it
/// would end up abstract.
fn select_method(
	class: &Arc<LoadedClass>,
	interfaces: &[Arc<LoadedClass>],
	method: &Method,
) -> Result<Option<Arc<LoadedClass>>, LinkError> {
	let descriptor = method.desc.to_string();

	let mut current = Some(class.clone());
	while let Some(candidate) = current {
		if let Some(found) = candidate.methods.find(&method.name, &descriptor) {
			if !found.is_static() && !found.is_private() {
				let concrete = !found.is_abstract();
				return Ok(concrete.then_some(candidate));
			}
		}
		current = candidate
			.superface
			.superclass
			.as_ref()
			.and_then(Superface::get);
	}

	let defaults: Vec<&Arc<LoadedClass>> = interfaces
		.iter()
		.filter(|interface| {
			interface
				.methods
				.find(&method.name, &descriptor)
				.is_some_and(is_default)
		})
		.collect();
	let most_specific: Vec<&Arc<LoadedClass>> = defaults
		.iter()
		.filter(|candidate| {
			!defaults
				.iter()
				.any(|other| !Arc::ptr_eq(other, candidate) && extends(other, candidate))
		})
		.copied()
		.collect();

	match most_specific.as_slice() {
		[] => Ok(None),
		[holder] => Ok(Some(Arc::clone(holder))),
		conflicting => {
			let names: Vec<String> = conflicting
				.iter()
				.map(|v| format!("{}.{}", v.name.external_name(), method.name))
				.collect();
			Err(LinkError::IncompatibleClassChange(format!(
				"Conflicting default methods: {}",
				names.join(" ")
			)))
		}
	}
}

fn is_default(method: &Method) -> bool {
	!method.is_abstract()
		&& !method.is_static()
		&& !method.is_private()
		&& !method.flags.contains(MethodAccessFlags::BRIDGE)
}

/// Every interface `class` implements, directly or through supertypes, each once.
fn all_interfaces(class: &Arc<LoadedClass>) -> Vec<Arc<LoadedClass>> {
	let mut queue = VecDeque::new();
	let mut current = Some(class.clone());
	while let Some(class) = current {
		queue.extend(class.superface.interfaces.iter().filter_map(Superface::get));
		current = class.superface.superclass.as_ref().and_then(Superface::get);
	}

	let mut output: Vec<Arc<LoadedClass>> = Vec::new();
	while let Some(interface) = queue.pop_front() {
		if output.iter().any(|v| Arc::ptr_eq(v, &interface)) {
			continue;
		}
		queue.extend(interface.superface.interfaces.iter().filter_map(Superface::get));
		output.push(interface);
	}
	output
}

fn extends(interface: &LoadedClass, other: &Arc<LoadedClass>) -> bool {
	interface
		.superface
		.interfaces
		.iter()
		.filter_map(Superface::get)
		.any(|direct| Arc::ptr_eq(&direct, other) || extends(&direct, other))
}
