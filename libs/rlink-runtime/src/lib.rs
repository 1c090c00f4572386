//! Class resolution and linkage.
//!
//! [`RuntimeLoadingContext`] owns the loader registry, the constraint table and the optional
//! archive. [`ClassResolver`] implements parent-first resolution on top of it, defining classes
//! from archives or class sources and linking them, which is where loader constraints come from.

mod constraints;
mod context;
mod diagnostics;
mod error;
mod itable;
mod link;
mod placeholder;
mod resolver;

pub use constraints::*;
pub use context::*;
pub use diagnostics::*;
pub use error::*;
pub use placeholder::*;
pub use resolver::*;
