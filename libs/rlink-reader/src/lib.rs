//! Reading and writing of `.class` files.
//!
//! Parsing is done with `nom` over the raw bytes. [`ClassInfo::parse_complete`] is the entry point
//! most callers want, it turns parser failures into an [`eyre::Report`] carrying byte offsets.
//! [`ClassWriter`] produces class files, which is how in-memory loaders synthesise classes.

use nom::error::VerboseError;

pub use attribute::*;
pub use class::*;
pub use code::*;
pub use consts::*;
pub use error::*;
pub use field::*;
pub use method::*;
pub use writer::*;

mod attribute;
mod class;
mod code;
mod consts;
mod error;
mod field;
mod method;
mod writer;

pub type IResult<'a, O> = nom::IResult<&'a [u8], O, VerboseError<&'a [u8]>>;

pub const CLASS_MAGIC: [u8; 4] = *b"\xca\xfe\xba\xbe";
