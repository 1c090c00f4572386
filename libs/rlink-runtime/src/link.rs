use crate::error::LinkError;
use crate::placeholder::Phase;
use crate::resolver::ClassResolver;
use rlink_class::{LinkState, LoadedClass};
use std::sync::Arc;
use tracing::debug;

impl ClassResolver<'_> {
	/// Links a loaded class: resolves its supertypes through its defining loader, checks the
	/// hierarchy and the loader constraints its itable implies. A failure sticks to the class.
	pub fn link(&self, class: &Arc<LoadedClass>) -> Result<(), LinkError> {
		if let Some(result) = link_outcome(class) {
			return result;
		}

		let _guard = self.acquire(&class.name, class.loader, Phase::Link)?;
		if let Some(result) = link_outcome(class) {
			return result;
		}

		class.set_link_state(LinkState::Linking);
		match self.link_supertypes(class) {
			Ok(()) => {
				class.set_link_state(LinkState::Linked);
				if !self.context.options().retain_class_bytes {
					class.discard_bytes();
				}
				debug!("Linked {class:?}");
				Ok(())
			}
			// Nothing about the class is wrong, a later attempt may succeed.
			Err(error @ LinkError::ResolutionDeadlock { .. }) => {
				class.set_link_state(LinkState::Loaded);
				Err(error)
			}
			Err(error) => {
				debug!("Linking {class:?} failed: {error}");
				class.set_link_state(LinkState::Failed(error.to_string()));
				Err(error)
			}
		}
	}

	fn link_supertypes(&self, class: &Arc<LoadedClass>) -> Result<(), LinkError> {
		if let Some(superface) = &class.superface.superclass {
			let superclass = self.resolve(&superface.ty, class.loader)?;
			if superclass.is_interface() {
				return Err(LinkError::IncompatibleClassChange(format!(
					"class {} has interface {} as super class",
					class.name.external_name(),
					superclass.name.external_name()
				)));
			}
			if superclass.is_final() {
				return Err(LinkError::IncompatibleClassChange(format!(
					"class {} cannot inherit from final class {}",
					class.name.external_name(),
					superclass.name.external_name()
				)));
			}
			if !superface.resolve(&superclass) {
				return Err(changed_supertype(class, &superclass));
			}
		}

		for superface in &class.superface.interfaces {
			let interface = self.resolve(&superface.ty, class.loader)?;
			if !interface.is_interface() {
				return Err(LinkError::IncompatibleClassChange(format!(
					"class {} can not implement {}, because it is not an interface",
					class.name.external_name(),
					interface.name.external_name()
				)));
			}
			if !superface.resolve(&interface) {
				return Err(changed_supertype(class, &interface));
			}
		}

		if !class.is_interface() {
			self.check_itable(class)?;
		}
		Ok(())
	}
}

/// An earlier link attempt bound the same reference to another class.
fn changed_supertype(class: &LoadedClass, supertype: &LoadedClass) -> LinkError {
	LinkError::IncompatibleClassChange(format!(
		"class {} resolved {} to a different class than an earlier attempt",
		class.name.external_name(),
		supertype.name.external_name()
	))
}

fn link_outcome(class: &LoadedClass) -> Option<Result<(), LinkError>> {
	match class.link_state() {
		LinkState::Linked => Some(Ok(())),
		LinkState::Failed(reason) => Some(Err(LinkError::PreviouslyFailed {
			class: class.name.external_name(),
			reason,
		})),
		LinkState::Loaded | LinkState::Linking => None,
	}
}
