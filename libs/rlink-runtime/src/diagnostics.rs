use rlink_class::{LoadedClass, Method};
use rlink_core::LoaderId;
use rlink_loader::{LoaderKind, LoaderRegistry};

/// `'app'`, `pkg.MyLoader @1f`, or the raw id for loaders that are gone.
pub fn loader_name(registry: &LoaderRegistry, loader: LoaderId) -> String {
	match registry.get(loader) {
		Some(loader) => loader.name_and_id(),
		None => loader.to_string(),
	}
}

/// `pkg.C is in unnamed module of loader 'app'`, plus the parent of user loaders whose parent is
/// not the bootstrap loader.
pub fn class_in_module_of_loader(registry: &LoaderRegistry, class: &LoadedClass) -> String {
	let mut output = format!(
		"{} is in unnamed module of loader {}",
		class.name.external_name(),
		loader_name(registry, class.loader)
	);

	let Some(loader) = registry.get(class.loader) else {
		return output;
	};
	if loader.is_builtin() {
		return output;
	}
	if let Some(parent) = loader.parent().and_then(|v| registry.get(v)) {
		if *parent.kind() != LoaderKind::Bootstrap {
			output.push_str(", parent loader ");
			output.push_str(&parent.name_and_id());
		}
	}
	output
}

/// The message for a failed itable check. `interface` declares `method`, `holder` is where the
/// selected implementation lives, `ty` the internal name both loaders see differently.
pub fn itable_violation(
	registry: &LoaderRegistry,
	class: &LoadedClass,
	interface: &LoadedClass,
	method: &Method,
	holder: &LoadedClass,
	ty: &str,
) -> String {
	let kind = if holder.is_interface() {
		"interface"
	} else {
		"class"
	};
	format!(
		"loader constraint violation in interface itable initialization for class {}: \
		 when selecting method '{} {}.{}{}' the class loader {} for super interface {}, \
		 and the class loader {} of the selected method's {kind}, {} have different Class objects \
		 for the type {} used in the signature ({}; {})",
		class.name.external_name(),
		method.desc.external_return(),
		interface.name.external_name(),
		method.name,
		method.desc.external_parameters(),
		loader_name(registry, interface.loader),
		interface.name.external_name(),
		loader_name(registry, holder.loader),
		holder.name.external_name(),
		ty.replace('/', "."),
		class_in_module_of_loader(registry, interface),
		class_in_module_of_loader(registry, holder),
	)
}

/// The message for a class that would break a constraint the moment it became visible.
pub fn define_violation(
	registry: &LoaderRegistry,
	loader: LoaderId,
	name: &str,
	previous: LoaderId,
) -> String {
	format!(
		"loader constraint violation: loader {} wants to load class {}. \
		 A different class with the same name was previously loaded by {}.",
		loader_name(registry, loader),
		name.replace('/', "."),
		loader_name(registry, previous),
	)
}
