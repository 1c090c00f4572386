use eyre::ContextCompat;
use rlink_core::{MethodAccessFlags, MethodDescriptor, Storage, StorageValue, VecExt};
use rlink_reader::{AttributeInfo, ConstantPool, MethodInfo};
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, Range};
use std::sync::Arc;

pub struct ClassMethods {
	storage: Storage<MethodIdentifier, Method>,
}

impl ClassMethods {
	pub fn new(methods: Vec<Method>) -> ClassMethods {
		let mut storage = Storage::new();
		for method in methods {
			storage.insert(method.to_identifier(), method);
		}

		ClassMethods { storage }
	}

	pub fn find(&self, name: &str, descriptor: &str) -> Option<&Method> {
		self.storage.get_keyed(&MethodIdentifier::new(name, descriptor))
	}
}

impl Deref for ClassMethods {
	type Target = Storage<MethodIdentifier, Method>;

	fn deref(&self) -> &Self::Target {
		&self.storage
	}
}

pub struct Method {
	pub name: String,
	pub desc: MethodDescriptor,
	pub flags: MethodAccessFlags,
	pub code: Option<MethodCode>,
}

impl Method {
	pub fn parse(mut info: MethodInfo, consts: &ConstantPool) -> eyre::Result<Method> {
		let name = consts
			.utf8(info.name_index)
			.wrap_err("Method name is not a Utf8 constant")?;
		let desc_str = consts
			.utf8(info.descriptor_index)
			.wrap_err("Method descriptor is not a Utf8 constant")?;
		let desc = MethodDescriptor::parse(desc_str)
			.wrap_err_with(|| format!("Invalid method descriptor {desc_str}"))?;

		let code = info
			.attributes
			.find_and_remove(|v| matches!(v, AttributeInfo::CodeAttribute { .. }))
			.and_then(|attribute| match attribute {
				AttributeInfo::CodeAttribute { code } => Some(MethodCode {
					max_stack: code.max_stack,
					max_locals: code.max_locals,
					bytes: CodeBytes::owned(code.code),
				}),
				_ => None,
			});

		Ok(Method {
			name: name.to_string(),
			desc,
			flags: info.access_flags,
			code,
		})
	}

	pub fn to_identifier(&self) -> MethodIdentifier {
		MethodIdentifier {
			name: Arc::from(&*self.name),
			descriptor: Arc::from(self.desc.to_string()),
		}
	}

	pub fn is_static(&self) -> bool {
		self.flags.contains(MethodAccessFlags::STATIC)
	}

	pub fn is_abstract(&self) -> bool {
		self.flags.contains(MethodAccessFlags::ABSTRACT)
	}

	pub fn is_private(&self) -> bool {
		self.flags.contains(MethodAccessFlags::PRIVATE)
	}

	/// Instance initializers and class initializers never take part in method selection.
	pub fn is_initializer(&self) -> bool {
		self.name == "<init>" || self.name == "<clinit>"
	}
}

impl Debug for Method {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}", self.name, self.desc)
	}
}

impl StorageValue for Method {
	type Idx = u16;
}

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct MethodIdentifier {
	pub name: Arc<str>,
	pub descriptor: Arc<str>,
}

impl MethodIdentifier {
	pub fn new(name: &str, descriptor: &str) -> MethodIdentifier {
		MethodIdentifier {
			name: Arc::from(name),
			descriptor: Arc::from(descriptor),
		}
	}
}

pub struct MethodCode {
	pub max_stack: u16,
	pub max_locals: u16,
	pub bytes: CodeBytes,
}

/// A read-only buffer several classes can point into, either a mapped file or plain memory.
pub type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// Bytecode of a method. Either owned, or a window into a larger shared buffer such as a mapped
/// archive, in which case nothing is copied until someone reads it.
#[derive(Clone)]
pub struct CodeBytes {
	data: SharedBytes,
	range: Range<usize>,
}

impl CodeBytes {
	pub fn owned(code: Vec<u8>) -> CodeBytes {
		let range = 0..code.len();
		CodeBytes {
			data: Arc::new(code),
			range,
		}
	}

	/// Returns `None` when the range does not fit inside `data`.
	pub fn shared(data: SharedBytes, range: Range<usize>) -> Option<CodeBytes> {
		if range.start > range.end || range.end > (*data).as_ref().len() {
			return None;
		}
		Some(CodeBytes { data, range })
	}

	pub fn as_slice(&self) -> &[u8] {
		&(*self.data).as_ref()[self.range.clone()]
	}

	pub fn len(&self) -> usize {
		self.range.len()
	}

	pub fn is_empty(&self) -> bool {
		self.range.is_empty()
	}
}

impl Debug for CodeBytes {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "CodeBytes({} bytes)", self.len())
	}
}
