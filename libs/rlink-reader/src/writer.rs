use std::collections::HashMap;

use rlink_core::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

use crate::{ConstantTag, CLASS_MAGIC};

pub const DEFAULT_MAJOR_VERSION: u16 = 61;

/// Body of a `Code` attribute.
#[derive(Clone, Debug)]
pub struct CodeBody {
	pub max_stack: u16,
	pub max_locals: u16,
	pub code: Vec<u8>,
}

impl CodeBody {
	pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> CodeBody {
		CodeBody {
			max_stack,
			max_locals,
			code,
		}
	}
}

struct FieldEntry {
	flags: FieldAccessFlags,
	name: String,
	descriptor: String,
}

struct MethodEntry {
	flags: MethodAccessFlags,
	name: String,
	descriptor: String,
	code: Option<CodeBody>,
}

/// Builds class files. Nothing is validated here, so broken classes can be produced on purpose.
pub struct ClassWriter {
	major_version: u16,
	minor_version: u16,
	access: ClassAccessFlags,
	name: String,
	super_class: Option<String>,
	interfaces: Vec<String>,
	fields: Vec<FieldEntry>,
	methods: Vec<MethodEntry>,
	longs: Vec<i64>,
	source_file: Option<String>,
}

impl ClassWriter {
	/// A public class extending `java/lang/Object`.
	pub fn new(name: impl Into<String>) -> ClassWriter {
		ClassWriter {
			major_version: DEFAULT_MAJOR_VERSION,
			minor_version: 0,
			access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
			name: name.into(),
			super_class: Some("java/lang/Object".to_string()),
			interfaces: vec![],
			fields: vec![],
			methods: vec![],
			longs: vec![],
			source_file: None,
		}
	}

	pub fn new_interface(name: impl Into<String>) -> ClassWriter {
		ClassWriter::new(name)
			.access(ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT)
	}

	pub fn version(mut self, major: u16, minor: u16) -> Self {
		self.major_version = major;
		self.minor_version = minor;
		self
	}

	pub fn access(mut self, access: ClassAccessFlags) -> Self {
		self.access = access;
		self
	}

	pub fn super_class(mut self, name: impl Into<String>) -> Self {
		self.super_class = Some(name.into());
		self
	}

	pub fn no_super(mut self) -> Self {
		self.super_class = None;
		self
	}

	pub fn interface(mut self, name: impl Into<String>) -> Self {
		self.interfaces.push(name.into());
		self
	}

	pub fn field(
		mut self,
		flags: FieldAccessFlags,
		name: impl Into<String>,
		descriptor: impl Into<String>,
	) -> Self {
		self.fields.push(FieldEntry {
			flags,
			name: name.into(),
			descriptor: descriptor.into(),
		});
		self
	}

	pub fn method(
		mut self,
		flags: MethodAccessFlags,
		name: impl Into<String>,
		descriptor: impl Into<String>,
		code: Option<CodeBody>,
	) -> Self {
		self.methods.push(MethodEntry {
			flags,
			name: name.into(),
			descriptor: descriptor.into(),
			code,
		});
		self
	}

	pub fn long_constant(mut self, value: i64) -> Self {
		self.longs.push(value);
		self
	}

	pub fn source_file(mut self, name: impl Into<String>) -> Self {
		self.source_file = Some(name.into());
		self
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut pool = PoolWriter::default();
		let mut body = Vec::new();

		for value in &self.longs {
			pool.long(*value);
		}

		put_u16(&mut body, self.access.bits());
		put_u16(&mut body, pool.class(&self.name));
		let super_index = match &self.super_class {
			Some(name) => pool.class(name),
			None => 0,
		};
		put_u16(&mut body, super_index);

		put_u16(&mut body, self.interfaces.len() as u16);
		for interface in &self.interfaces {
			put_u16(&mut body, pool.class(interface));
		}

		put_u16(&mut body, self.fields.len() as u16);
		for field in &self.fields {
			put_u16(&mut body, field.flags.bits());
			put_u16(&mut body, pool.utf8(&field.name));
			put_u16(&mut body, pool.utf8(&field.descriptor));
			put_u16(&mut body, 0);
		}

		put_u16(&mut body, self.methods.len() as u16);
		for method in &self.methods {
			put_u16(&mut body, method.flags.bits());
			put_u16(&mut body, pool.utf8(&method.name));
			put_u16(&mut body, pool.utf8(&method.descriptor));
			match &method.code {
				None => put_u16(&mut body, 0),
				Some(code) => {
					put_u16(&mut body, 1);
					put_u16(&mut body, pool.utf8("Code"));
					put_u32(&mut body, 12 + code.code.len() as u32);
					put_u16(&mut body, code.max_stack);
					put_u16(&mut body, code.max_locals);
					put_u32(&mut body, code.code.len() as u32);
					body.extend_from_slice(&code.code);
					// exception table, attributes
					put_u16(&mut body, 0);
					put_u16(&mut body, 0);
				}
			}
		}

		match &self.source_file {
			None => put_u16(&mut body, 0),
			Some(source_file) => {
				put_u16(&mut body, 1);
				put_u16(&mut body, pool.utf8("SourceFile"));
				put_u32(&mut body, 2);
				put_u16(&mut body, pool.utf8(source_file));
			}
		}

		let mut output = Vec::with_capacity(10 + pool.data.len() + body.len());
		output.extend_from_slice(&CLASS_MAGIC);
		put_u16(&mut output, self.minor_version);
		put_u16(&mut output, self.major_version);
		put_u16(&mut output, pool.next);
		output.extend_from_slice(&pool.data);
		output.extend_from_slice(&body);
		output
	}
}

#[derive(Clone, Eq, PartialEq, Hash)]
enum PoolKey {
	Utf8(String),
	Class(String),
	Long(i64),
}

struct PoolWriter {
	lookup: HashMap<PoolKey, u16>,
	data: Vec<u8>,
	/// The index the next entry will get, which is also the `constant_pool_count` to write.
	next: u16,
}

impl Default for PoolWriter {
	fn default() -> Self {
		PoolWriter {
			lookup: HashMap::new(),
			data: vec![],
			next: 1,
		}
	}
}

impl PoolWriter {
	fn utf8(&mut self, value: &str) -> u16 {
		let key = PoolKey::Utf8(value.to_string());
		if let Some(index) = self.lookup.get(&key) {
			return *index;
		}

		let encoded = mutf8::utf8_to_mutf8(value.as_bytes())
			.map(|v| v.into_owned())
			.unwrap_or_else(|_| value.as_bytes().to_vec());
		self.data.push(ConstantTag::Utf8 as u8);
		put_u16(&mut self.data, encoded.len() as u16);
		self.data.extend_from_slice(&encoded);
		self.push(key, 1)
	}

	fn class(&mut self, name: &str) -> u16 {
		let key = PoolKey::Class(name.to_string());
		if let Some(index) = self.lookup.get(&key) {
			return *index;
		}

		let name_index = self.utf8(name);
		self.data.push(ConstantTag::Class as u8);
		put_u16(&mut self.data, name_index);
		self.push(key, 1)
	}

	fn long(&mut self, value: i64) -> u16 {
		let key = PoolKey::Long(value);
		if let Some(index) = self.lookup.get(&key) {
			return *index;
		}

		self.data.push(ConstantTag::Long as u8);
		self.data.extend_from_slice(&value.to_be_bytes());
		self.push(key, 2)
	}

	fn push(&mut self, key: PoolKey, slots: u16) -> u16 {
		let index = self.next;
		self.next += slots;
		self.lookup.insert(key, index);
		index
	}
}

fn put_u16(output: &mut Vec<u8>, value: u16) {
	output.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(output: &mut Vec<u8>, value: u32) {
	output.extend_from_slice(&value.to_be_bytes());
}
