use rlink_core::LoaderId;
use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RegistryError {
	#[error("Loader {0} is already registered")]
	DuplicateLoader(LoaderId),
	#[error("Loader {loader} already defined class {name}")]
	AlreadyDefined { loader: LoaderId, name: String },
	#[error("Registering {loader} with parent {parent} would create a delegation cycle")]
	CyclicDelegation { loader: LoaderId, parent: LoaderId },
	#[error("Loader {0} is not registered")]
	UnknownLoader(LoaderId),
	#[error("Loader {loader} still has {children} child loaders")]
	LoaderInUse { loader: LoaderId, children: usize },
}
