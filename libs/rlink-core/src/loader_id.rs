use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_LOADER: AtomicU32 = AtomicU32::new(1);

/// Identity of a class loader instance. Two ids are equal only when they were produced by the
/// same [`LoaderId::next`] call.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LoaderId(u32);

impl LoaderId {
	pub fn next() -> LoaderId {
		LoaderId(NEXT_LOADER.fetch_add(1, Ordering::Relaxed))
	}

	pub fn raw(self) -> u32 {
		self.0
	}

	/// An opaque token in the style of an identity hash, used in diagnostics only.
	pub fn identity_hash(self) -> u32 {
		self.0.wrapping_mul(0x9E37_79B1).rotate_left(7)
	}
}

impl Display for LoaderId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "loader#{}", self.0)
	}
}
