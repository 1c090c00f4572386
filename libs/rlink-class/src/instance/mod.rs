mod field;
mod method;
mod superface;

pub use crate::instance::field::*;
pub use crate::instance::method::*;
pub use crate::instance::superface::*;
use crate::{class_checksum, verify, ClassFormatError};
use eyre::{Context, ContextCompat};
use parking_lot::Mutex;
use rlink_core::{ClassAccessFlags, LoaderId, ObjectType};
use rlink_reader::ClassInfo;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::trace;

/// Where the metadata of a class came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClassOrigin {
	/// Parsed and verified from bytes handed out by a class source.
	Parsed,
	/// Expanded from an archive entry, nothing was parsed.
	Archived,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
	Loaded,
	Linking,
	Linked,
	/// Linking failed. Terminal, the class is never handed out again.
	Failed(String),
}

/// A class defined by exactly one loader.
///
/// Supertypes are only referenced weakly through [`ClassSuperface`], ownership of every class lies
/// with the registry entry of its defining loader.
pub struct LoadedClass {
	pub name: ObjectType,
	pub loader: LoaderId,
	pub flags: ClassAccessFlags,
	pub superface: ClassSuperface,
	pub methods: ClassMethods,
	pub fields: ClassFields,
	/// Checksum of the class file this class was defined from.
	pub checksum: u32,
	pub origin: ClassOrigin,
	state: Mutex<LinkState>,
	bytes: Mutex<Option<Arc<[u8]>>>,
}

/// Everything needed to build a [`LoadedClass`] without a class file.
pub struct ClassParts {
	pub name: ObjectType,
	pub flags: ClassAccessFlags,
	pub superclass: Option<ObjectType>,
	pub interfaces: Vec<ObjectType>,
	pub methods: Vec<Method>,
	pub fields: Vec<Field>,
	pub checksum: u32,
}

impl ClassParts {
	/// Parses and verifies a class file.
	pub fn parse(bytes: &[u8]) -> Result<ClassParts, ClassFormatError> {
		let info = ClassInfo::parse_complete(bytes)
			.map_err(|error| ClassFormatError::Malformed(format!("{error:#}")))?;
		if let Err(error) = verify(&info) {
			trace!("Rejected class file: {error}");
			return Err(error.into());
		}

		ClassParts::from_info(info, class_checksum(bytes))
			.map_err(|error| ClassFormatError::Malformed(format!("{error:#}")))
	}

	fn from_info(info: ClassInfo, checksum: u32) -> eyre::Result<ClassParts> {
		let cp = &info.constant_pool;
		let name = info.name().wrap_err("Class name is not a Class constant")?;

		let mut interfaces = Vec::new();
		for interface in &info.interfaces {
			let interface = cp.class_name(*interface).wrap_err("Interface is not a Class constant")?;
			interfaces.push(ObjectType::new(interface));
		}

		let mut fields = Vec::new();
		for field in &info.fields {
			fields.push(Field::parse(field, cp).wrap_err("Fields")?);
		}

		let mut methods = Vec::new();
		for method in &info.methods {
			let method_name = cp.utf8(method.name_index).unwrap_or("<invalid>");
			let method = Method::parse(method.clone(), cp)
				.wrap_err_with(|| format!("in METHOD \"{method_name}\""))?;
			methods.push(method);
		}

		Ok(ClassParts {
			name: ObjectType::new(name),
			flags: info.access_flags,
			superclass: info.super_name().map(ObjectType::new),
			interfaces,
			methods,
			fields,
			checksum,
		})
	}
}

impl LoadedClass {
	/// Parses and verifies `bytes` into a class defined by `loader`.
	pub fn define(bytes: &[u8], loader: LoaderId) -> Result<LoadedClass, ClassFormatError> {
		let parts = ClassParts::parse(bytes)?;
		Ok(LoadedClass::build(parts, loader, ClassOrigin::Parsed))
	}

	/// Builds a class from metadata recorded elsewhere, an archive for instance.
	pub fn from_parts(parts: ClassParts, loader: LoaderId) -> LoadedClass {
		LoadedClass::build(parts, loader, ClassOrigin::Archived)
	}

	fn build(parts: ClassParts, loader: LoaderId, origin: ClassOrigin) -> LoadedClass {
		LoadedClass {
			name: parts.name,
			loader,
			flags: parts.flags,
			superface: ClassSuperface::new(parts.superclass, parts.interfaces),
			methods: ClassMethods::new(parts.methods),
			fields: ClassFields::new(parts.fields),
			checksum: parts.checksum,
			origin,
			state: Mutex::new(LinkState::Loaded),
			bytes: Mutex::new(None),
		}
	}

	pub fn is_interface(&self) -> bool {
		self.flags.contains(ClassAccessFlags::INTERFACE)
	}

	pub fn is_final(&self) -> bool {
		self.flags.contains(ClassAccessFlags::FINAL)
	}

	pub fn is_abstract(&self) -> bool {
		self.flags.contains(ClassAccessFlags::ABSTRACT)
	}

	pub fn link_state(&self) -> LinkState {
		self.state.lock().clone()
	}

	pub fn set_link_state(&self, state: LinkState) {
		*self.state.lock() = state;
	}

	pub fn is_linked(&self) -> bool {
		matches!(*self.state.lock(), LinkState::Linked)
	}

	/// Keeps the class file around, normally it is dropped once linking completes.
	pub fn retain_bytes(&self, bytes: Arc<[u8]>) {
		*self.bytes.lock() = Some(bytes);
	}

	pub fn retained_bytes(&self) -> Option<Arc<[u8]>> {
		self.bytes.lock().clone()
	}

	pub fn discard_bytes(&self) {
		self.bytes.lock().take();
	}

	/// A comparable snapshot of everything observable about this class apart from its identity.
	pub fn shape(&self) -> ClassShape {
		ClassShape {
			name: self.name.name.clone(),
			flags: self.flags.bits(),
			superclass: self.superface.superclass.as_ref().map(|v| v.ty.name.clone()),
			interfaces: self.superface.interfaces.iter().map(|v| v.ty.name.clone()).collect(),
			methods: self
				.methods
				.iter()
				.map(|method| MethodShape {
					name: method.name.clone(),
					descriptor: method.desc.to_string(),
					flags: method.flags.bits(),
					code: method.code.as_ref().map(|code| {
						(code.max_stack, code.max_locals, code.bytes.as_slice().to_vec())
					}),
				})
				.collect(),
			fields: self
				.fields
				.iter()
				.map(|field| (field.name.clone(), field.ty.to_string(), field.flags.bits()))
				.collect(),
		}
	}
}

impl Debug for LoadedClass {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}", self.name.name, self.loader)
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassShape {
	pub name: String,
	pub flags: u16,
	pub superclass: Option<String>,
	pub interfaces: Vec<String>,
	pub methods: Vec<MethodShape>,
	pub fields: Vec<(String, String, u16)>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodShape {
	pub name: String,
	pub descriptor: String,
	pub flags: u16,
	pub code: Option<(u16, u16, Vec<u8>)>,
}
