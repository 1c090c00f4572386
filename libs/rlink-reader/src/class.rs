use crate::attribute::AttributeInfo;
use crate::consts::ConstantPool;
use crate::field::FieldInfo;
use crate::method::MethodInfo;
use crate::{be_cp, format_error, ClassConst, ConstPtr, IResult, CLASS_MAGIC};
use eyre::bail;
use nom::bytes::complete::tag;
use nom::combinator::map;
use nom::error::context;
use nom::multi::length_count;
use nom::number::complete::be_u16;
use rlink_core::ClassAccessFlags;

pub struct ClassInfo {
	pub minor_version: u16,
	pub major_version: u16,
	pub constant_pool: ConstantPool,
	pub access_flags: ClassAccessFlags,

	pub this_class: ConstPtr<ClassConst>,
	pub super_class: ConstPtr<ClassConst>,

	pub interfaces: Vec<ConstPtr<ClassConst>>,
	pub fields: Vec<FieldInfo>,
	pub methods: Vec<MethodInfo>,
	pub attributes: Vec<AttributeInfo>,
}

impl ClassInfo {
	pub fn parse(input: &[u8]) -> IResult<Self> {
		let (input, _) = context("CAFE", tag(&CLASS_MAGIC[..]))(input)?;
		let (input, minor_version) = context("Java Minor Version", be_u16)(input)?;
		let (input, major_version) = context("Java Major Version", be_u16)(input)?;
		let (input, constant_pool) = context("Constant Pool", ConstantPool::parse)(input)?;
		let (input, access_flags) = context(
			"Access flags",
			map(be_u16, ClassAccessFlags::from_bits_retain),
		)(input)?;
		let (input, this_class) = context("This class", be_cp)(input)?;
		let (input, super_class) = context("Class Superclass", be_cp)(input)?;
		let (input, interfaces) = context("Interfaces", length_count(be_u16, be_cp))(input)?;

		let (input, fields) = context(
			"Fields",
			length_count(be_u16, |input| FieldInfo::parse(input, &constant_pool)),
		)(input)?;
		let (input, methods) = context(
			"Methods",
			length_count(be_u16, |input| MethodInfo::parse(input, &constant_pool)),
		)(input)?;
		let (input, attributes) = AttributeInfo::parse_list(input, &constant_pool)?;

		Ok((
			input,
			ClassInfo {
				minor_version,
				major_version,
				constant_pool,
				access_flags,
				this_class,
				super_class,
				interfaces,
				fields,
				methods,
				attributes,
			},
		))
	}

	/// Parses a whole class file, trailing bytes are an error.
	pub fn parse_complete(data: &[u8]) -> eyre::Result<ClassInfo> {
		match ClassInfo::parse(data) {
			Ok((remaining, info)) => {
				if !remaining.is_empty() {
					bail!("{} trailing bytes after class file", remaining.len());
				}
				Ok(info)
			}
			Err(nom::Err::Error(error) | nom::Err::Failure(error)) => {
				Err(format_error(error, data))
			}
			Err(nom::Err::Incomplete(_)) => bail!("Class file is truncated"),
		}
	}

	pub fn name(&self) -> Option<&str> {
		self.constant_pool.class_name(self.this_class)
	}

	/// `None` both when there is no superclass and when the index is broken, verification tells
	/// those apart by looking at `super_class` directly.
	pub fn super_name(&self) -> Option<&str> {
		self.constant_pool.class_name(self.super_class)
	}

	pub fn is_interface(&self) -> bool {
		self.access_flags.contains(ClassAccessFlags::INTERFACE)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ClassWriter, CodeBody};
	use rlink_core::MethodAccessFlags;

	#[test]
	fn reads_written_class() {
		let bytes = ClassWriter::new("test/C")
			.interface("test/I")
			.field(rlink_core::FieldAccessFlags::PRIVATE, "count", "J")
			.method(
				MethodAccessFlags::PUBLIC,
				"m",
				"()Ltest/Foo;",
				Some(CodeBody::new(1, 1, vec![0x01, 0xb0])),
			)
			.to_bytes();

		let info = ClassInfo::parse_complete(&bytes).unwrap();
		assert_eq!(info.name(), Some("test/C"));
		assert_eq!(info.super_name(), Some("java/lang/Object"));
		assert_eq!(info.interfaces.len(), 1);
		assert_eq!(info.constant_pool.class_name(info.interfaces[0]), Some("test/I"));

		let method = &info.methods[0];
		assert_eq!(info.constant_pool.utf8(method.name_index), Some("m"));
		let code = method
			.attributes
			.iter()
			.find_map(|attribute| match attribute {
				AttributeInfo::CodeAttribute { code } => Some(code),
				_ => None,
			})
			.unwrap();
		assert_eq!(code.code, vec![0x01, 0xb0]);
		assert_eq!(code.max_stack, 1);
	}

	#[test]
	fn rejects_bad_magic() {
		let mut bytes = ClassWriter::new("test/C").to_bytes();
		bytes[0] = 0xCB;
		let error = ClassInfo::parse_complete(&bytes).err().unwrap();
		assert!(format!("{error:?}").contains("CAFE"));
	}

	#[test]
	fn rejects_truncated_and_trailing() {
		let bytes = ClassWriter::new("test/C").to_bytes();
		assert!(ClassInfo::parse_complete(&bytes[..bytes.len() - 3]).is_err());

		let mut longer = bytes.clone();
		longer.push(0);
		assert!(ClassInfo::parse_complete(&longer).is_err());
	}

	#[test]
	fn wide_constants_take_two_slots() {
		let bytes = ClassWriter::new("test/C")
			.long_constant(7)
			.interface("test/I")
			.to_bytes();
		let info = ClassInfo::parse_complete(&bytes).unwrap();
		assert_eq!(info.constant_pool.class_name(info.interfaces[0]), Some("test/I"));
		assert!(info
			.constant_pool
			.iter()
			.any(|v| matches!(v, crate::ConstantInfo::Unusable)));
	}
}
