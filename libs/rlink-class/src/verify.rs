use std::collections::HashSet;

use rlink_core::{MethodAccessFlags, MethodDescriptor, ObjectType, Type};
use rlink_reader::{AttributeInfo, ClassInfo};
use thiserror::Error;

pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 69;

/// Structural problems found in a parsed class file before anything is defined from it.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum VerifyError {
	#[error("Unsupported class file version {major}.{minor}")]
	UnsupportedVersion { major: u16, minor: u16 },
	#[error("Constant pool index {index} for {what} is not a valid {expected} constant")]
	BadConstant {
		what: &'static str,
		index: u16,
		expected: &'static str,
	},
	#[error("Invalid class name \"{0}\"")]
	BadName(String),
	#[error("Class {0} has no superclass")]
	MissingSuperclass(String),
	#[error("java/lang/Object can not have a superclass")]
	ObjectWithSuperclass,
	#[error("Interface {0} must be abstract and extend java/lang/Object")]
	BadInterface(String),
	#[error("Invalid descriptor \"{descriptor}\" for {member}")]
	BadDescriptor { member: String, descriptor: String },
	#[error("Duplicate method {name}{descriptor}")]
	DuplicateMethod { name: String, descriptor: String },
	#[error("Duplicate field {0}")]
	DuplicateField(String),
	#[error("Method {0} has illegal modifiers")]
	IllegalModifiers(String),
	#[error("Method {0} has no Code attribute")]
	MissingCode(String),
	#[error("Abstract or native method {0} can not have a Code attribute")]
	UnexpectedCode(String),
}

/// Why a class could not be defined from a set of bytes.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ClassFormatError {
	#[error("Malformed class file: {0}")]
	Malformed(String),
	#[error(transparent)]
	Verify(#[from] VerifyError),
}

/// Checks the structural rules a class file has to follow before it can be defined.
pub fn verify(info: &ClassInfo) -> Result<(), VerifyError> {
	if info.major_version < MIN_MAJOR_VERSION || info.major_version > MAX_MAJOR_VERSION {
		return Err(VerifyError::UnsupportedVersion {
			major: info.major_version,
			minor: info.minor_version,
		});
	}

	let cp = &info.constant_pool;
	let name = cp.class_name(info.this_class).ok_or(VerifyError::BadConstant {
		what: "this_class",
		index: info.this_class.index(),
		expected: "Class",
	})?;
	if !ObjectType::is_valid_name(name) {
		return Err(VerifyError::BadName(name.to_string()));
	}

	if info.super_class.is_null() {
		if name != "java/lang/Object" {
			return Err(VerifyError::MissingSuperclass(name.to_string()));
		}
	} else {
		let super_name = cp.class_name(info.super_class).ok_or(VerifyError::BadConstant {
			what: "super_class",
			index: info.super_class.index(),
			expected: "Class",
		})?;
		if name == "java/lang/Object" {
			return Err(VerifyError::ObjectWithSuperclass);
		}
		if !ObjectType::is_valid_name(super_name) {
			return Err(VerifyError::BadName(super_name.to_string()));
		}
		if info.is_interface() && super_name != "java/lang/Object" {
			return Err(VerifyError::BadInterface(name.to_string()));
		}
	}

	if info.is_interface() && !info.access_flags.contains(rlink_core::ClassAccessFlags::ABSTRACT) {
		return Err(VerifyError::BadInterface(name.to_string()));
	}

	for interface in &info.interfaces {
		let interface_name = cp.class_name(*interface).ok_or(VerifyError::BadConstant {
			what: "interfaces",
			index: interface.index(),
			expected: "Class",
		})?;
		if !ObjectType::is_valid_name(interface_name) {
			return Err(VerifyError::BadName(interface_name.to_string()));
		}
	}

	let mut fields = HashSet::new();
	for field in &info.fields {
		let field_name = cp.utf8(field.name_index).ok_or(VerifyError::BadConstant {
			what: "field name",
			index: field.name_index.index(),
			expected: "Utf8",
		})?;
		let descriptor = cp.utf8(field.descriptor_index).ok_or(VerifyError::BadConstant {
			what: "field descriptor",
			index: field.descriptor_index.index(),
			expected: "Utf8",
		})?;
		if Type::parse(descriptor).is_none() {
			return Err(VerifyError::BadDescriptor {
				member: field_name.to_string(),
				descriptor: descriptor.to_string(),
			});
		}
		if !fields.insert(field_name) {
			return Err(VerifyError::DuplicateField(field_name.to_string()));
		}
	}

	let mut methods = HashSet::new();
	for method in &info.methods {
		let method_name = cp.utf8(method.name_index).ok_or(VerifyError::BadConstant {
			what: "method name",
			index: method.name_index.index(),
			expected: "Utf8",
		})?;
		let descriptor = cp.utf8(method.descriptor_index).ok_or(VerifyError::BadConstant {
			what: "method descriptor",
			index: method.descriptor_index.index(),
			expected: "Utf8",
		})?;
		if MethodDescriptor::parse(descriptor).is_none() {
			return Err(VerifyError::BadDescriptor {
				member: method_name.to_string(),
				descriptor: descriptor.to_string(),
			});
		}
		if !methods.insert((method_name, descriptor)) {
			return Err(VerifyError::DuplicateMethod {
				name: method_name.to_string(),
				descriptor: descriptor.to_string(),
			});
		}

		let flags = method.access_flags;
		let has_code = method
			.attributes
			.iter()
			.any(|v| matches!(v, AttributeInfo::CodeAttribute { .. }));
		let qualified = format!("{name}.{method_name}{descriptor}");
		if flags.contains(MethodAccessFlags::ABSTRACT) {
			let forbidden = MethodAccessFlags::PRIVATE
				| MethodAccessFlags::STATIC
				| MethodAccessFlags::FINAL
				| MethodAccessFlags::SYNCHRONIZED
				| MethodAccessFlags::NATIVE;
			if flags.intersects(forbidden) {
				return Err(VerifyError::IllegalModifiers(qualified));
			}
		}

		let bodiless = flags.intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE);
		if bodiless && has_code {
			return Err(VerifyError::UnexpectedCode(qualified));
		}
		if !bodiless && !has_code {
			return Err(VerifyError::MissingCode(qualified));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rlink_core::ClassAccessFlags;
	use rlink_reader::{ClassWriter, CodeBody};

	fn parse(writer: ClassWriter) -> ClassInfo {
		ClassInfo::parse_complete(&writer.to_bytes()).unwrap()
	}

	#[test]
	fn plain_class_passes() {
		let info = parse(ClassWriter::new("test/C").method(
			MethodAccessFlags::PUBLIC,
			"<init>",
			"()V",
			Some(CodeBody::new(1, 1, vec![0xb1])),
		));
		assert_eq!(verify(&info), Ok(()));
	}

	#[test]
	fn only_object_lacks_a_superclass() {
		assert_eq!(verify(&parse(ClassWriter::new("java/lang/Object").no_super())), Ok(()));
		assert_eq!(
			verify(&parse(ClassWriter::new("test/C").no_super())),
			Err(VerifyError::MissingSuperclass("test/C".to_string()))
		);
		assert_eq!(
			verify(&parse(ClassWriter::new("java/lang/Object"))),
			Err(VerifyError::ObjectWithSuperclass)
		);
	}

	#[test]
	fn interfaces_must_be_abstract() {
		let info = parse(
			ClassWriter::new("test/I").access(ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE),
		);
		assert_eq!(verify(&info), Err(VerifyError::BadInterface("test/I".to_string())));
		assert_eq!(verify(&parse(ClassWriter::new_interface("test/I"))), Ok(()));
	}

	#[test]
	fn rejects_duplicates_and_bad_descriptors() {
		let info = parse(
			ClassWriter::new("test/C")
				.field(rlink_core::FieldAccessFlags::PUBLIC, "x", "I")
				.field(rlink_core::FieldAccessFlags::PUBLIC, "x", "J"),
		);
		assert_eq!(verify(&info), Err(VerifyError::DuplicateField("x".to_string())));

		let info = parse(ClassWriter::new("test/C").field(
			rlink_core::FieldAccessFlags::PUBLIC,
			"x",
			"Q",
		));
		assert!(matches!(verify(&info), Err(VerifyError::BadDescriptor { .. })));

		let abstract_flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT;
		let info = parse(
			ClassWriter::new("test/C")
				.method(abstract_flags, "m", "()V", None)
				.method(abstract_flags, "m", "()V", None),
		);
		assert!(matches!(verify(&info), Err(VerifyError::DuplicateMethod { .. })));
	}

	#[test]
	fn code_must_match_modifiers() {
		let info = parse(ClassWriter::new("test/C").method(MethodAccessFlags::PUBLIC, "m", "()V", None));
		assert!(matches!(verify(&info), Err(VerifyError::MissingCode(_))));

		let info = parse(ClassWriter::new("test/C").method(
			MethodAccessFlags::ABSTRACT | MethodAccessFlags::STATIC,
			"m",
			"()V",
			None,
		));
		assert!(matches!(verify(&info), Err(VerifyError::IllegalModifiers(_))));
	}

	#[test]
	fn rejects_unsupported_versions() {
		let info = parse(ClassWriter::new("test/C").version(70, 0));
		assert_eq!(
			verify(&info),
			Err(VerifyError::UnsupportedVersion { major: 70, minor: 0 })
		);
	}
}
