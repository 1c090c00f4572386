use std::fmt::{Display, Formatter};

/// The addressing configuration of a runtime. Archives are only trusted when the configuration
/// recorded at dump time matches the live one bit for bit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RuntimeConfig {
	/// Width of a native pointer in bytes.
	pub pointer_width: u8,
	/// Whether object references are stored compressed.
	pub compressed_refs: bool,
	/// Shift applied when decoding a compressed reference.
	pub ref_shift: u8,
}

impl RuntimeConfig {
	pub const fn new(pointer_width: u8, compressed_refs: bool, ref_shift: u8) -> RuntimeConfig {
		RuntimeConfig {
			pointer_width,
			compressed_refs,
			ref_shift,
		}
	}

	/// The configuration of the current process.
	pub fn host() -> RuntimeConfig {
		let pointer_width = std::mem::size_of::<usize>() as u8;
		if pointer_width == 8 {
			RuntimeConfig::new(pointer_width, true, 3)
		} else {
			RuntimeConfig::new(pointer_width, false, 0)
		}
	}

	pub fn to_bytes(self) -> [u8; 4] {
		[
			self.pointer_width,
			self.compressed_refs as u8,
			self.ref_shift,
			0,
		]
	}

	pub fn from_bytes(bytes: [u8; 4]) -> Option<RuntimeConfig> {
		let compressed_refs = match bytes[1] {
			0 => false,
			1 => true,
			_ => return None,
		};
		if bytes[3] != 0 {
			return None;
		}

		Some(RuntimeConfig::new(bytes[0], compressed_refs, bytes[2]))
	}
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig::host()
	}
}

impl Display for RuntimeConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{}-bit pointers, compressed refs {} (shift {})",
			self.pointer_width as u32 * 8,
			if self.compressed_refs { "on" } else { "off" },
			self.ref_shift
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bytes_reject_garbage() {
		let config = RuntimeConfig::new(8, true, 3);
		assert_eq!(RuntimeConfig::from_bytes(config.to_bytes()), Some(config));
		assert_eq!(RuntimeConfig::from_bytes([8, 2, 3, 0]), None);
		assert_eq!(RuntimeConfig::from_bytes([8, 1, 3, 1]), None);
	}
}
