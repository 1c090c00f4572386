use rlink_class::ClassFormatError;
use rlink_core::LoaderId;
use rlink_loader::RegistryError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why resolving a class failed. Every variant reaches the caller that asked for the class.
#[derive(Debug, Error)]
pub enum LinkError {
	#[error("Class {class} is malformed: {source}")]
	ClassFormat {
		class: String,
		#[source]
		source: ClassFormatError,
	},
	#[error("{0}")]
	NoClassDefFound(String),
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error("{0}")]
	LoaderConstraintViolation(ConstraintViolation),
	#[error("{0}")]
	IncompatibleClassChange(String),
	#[error("{0}")]
	ClassCircularity(String),
	#[error("Resolution deadlock: waiting for {waiting} while {held} is waiting on this thread")]
	ResolutionDeadlock { waiting: String, held: String },
	#[error("Failed to read {class} from {loader}: {message}")]
	Source {
		class: String,
		loader: String,
		message: String,
	},
	#[error("Linking {class} failed earlier: {reason}")]
	PreviouslyFailed { class: String, reason: String },
}

/// Two loaders disagree on the class behind a name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConstraintViolation {
	/// Internal name of the contended class.
	pub name: String,
	pub loader: LoaderId,
	pub other: LoaderId,
	pub message: String,
}

impl ConstraintViolation {
	pub(crate) fn new(name: &str, loader: LoaderId, other: LoaderId) -> ConstraintViolation {
		ConstraintViolation {
			name: name.to_string(),
			loader,
			other,
			message: format!(
				"loader constraint violation: {loader} and {other} have different Class objects for the type {}",
				name.replace('/', ".")
			),
		}
	}

	pub(crate) fn with_message(mut self, message: String) -> ConstraintViolation {
		self.message = message;
		self
	}
}

impl Display for ConstraintViolation {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.message)
	}
}

impl std::error::Error for ConstraintViolation {}
