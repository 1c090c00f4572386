//! Read-only archives of pre-parsed classes.
//!
//! An archive is one file: a fixed [`ArchiveHeader`], a table of entries keyed by class name and
//! loader shape, and a blob of class records. [`ArchiveStore::open`] validates the whole file up
//! front, so an archive is either usable in full or not at all.

mod builder;
mod error;
mod header;
mod record;
mod store;

pub use builder::*;
pub use error::*;
pub use header::*;
pub use store::*;
