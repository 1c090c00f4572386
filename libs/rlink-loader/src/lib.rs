//! Class loaders and the registry that tracks their delegation graph.
//!
//! A [`Loader`] is a parent pointer plus a list of [`ClassSource`]s. The [`LoaderRegistry`] owns
//! every registered loader together with the classes it defined or initiated.

mod error;
mod loader;
mod registry;
mod source;

pub use error::*;
pub use loader::*;
pub use registry::*;
pub use source::*;
