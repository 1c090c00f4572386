use nom::bytes::complete::take;
use nom::combinator::{map, map_opt};
use nom::error::context;
use nom::multi::length_count;
use nom::number::complete::{be_u16, be_u32};
use nom::sequence::tuple;

use crate::code::Code;
use crate::consts::{ConstPtr, ConstantPool, UTF8Const};
use crate::IResult;

#[derive(Clone, Debug)]
pub struct AttributeException {
	pub start_pc: u16,
	pub end_pc: u16,
	pub handler_pc: u16,
	pub catch_type: u16,
}

impl AttributeException {
	pub fn parse(input: &[u8]) -> IResult<Self> {
		map(
			tuple((be_u16, be_u16, be_u16, be_u16)),
			|(start_pc, end_pc, handler_pc, catch_type)| AttributeException {
				start_pc,
				end_pc,
				handler_pc,
				catch_type,
			},
		)(input)
	}
}

#[derive(Clone, Debug)]
pub enum AttributeInfo {
	ConstantValue {
		constant_index: u16,
	},
	CodeAttribute {
		code: Code,
	},
	Exceptions {
		exception_index_table: Vec<u16>,
	},
	SourceFile {
		source_file: ConstPtr<UTF8Const>,
	},
	Signature {
		signature: ConstPtr<UTF8Const>,
	},
	Synthetic,
	Deprecated,
	/// Anything this reader does not interpret, kept by name and size only.
	Unknown {
		name: String,
		length: u32,
	},
}

impl AttributeInfo {
	pub fn parse_list<'a>(input: &'a [u8], constant_pool: &ConstantPool) -> IResult<'a, Vec<Self>> {
		context(
			"Attributes",
			length_count(be_u16, |input| AttributeInfo::parse(input, constant_pool)),
		)(input)
	}

	pub fn parse<'a>(input: &'a [u8], constant_pool: &ConstantPool) -> IResult<'a, Self> {
		let (input, name) = context(
			"Attribute name",
			map_opt(be_u16, |index| constant_pool.utf8(ConstPtr::new(index))),
		)(input)?;
		let (input, length) = be_u32(input)?;
		let (input, data) = take(length)(input)?;

		// Attributes are parsed from their own slice so a bad length can not eat into the next one.
		let (_, attribute) = match name {
			"ConstantValue" => map(be_u16, |constant_index| AttributeInfo::ConstantValue {
				constant_index,
			})(data)?,
			"Code" => context(
				"Code",
				map(
					|input| Code::parse(input, constant_pool),
					|code| AttributeInfo::CodeAttribute { code },
				),
			)(data)?,
			"Exceptions" => map(length_count(be_u16, be_u16), |exception_index_table| {
				AttributeInfo::Exceptions {
					exception_index_table,
				}
			})(data)?,
			"SourceFile" => map(be_u16, |index| AttributeInfo::SourceFile {
				source_file: ConstPtr::new(index),
			})(data)?,
			"Signature" => map(be_u16, |index| AttributeInfo::Signature {
				signature: ConstPtr::new(index),
			})(data)?,
			"Synthetic" => (data, AttributeInfo::Synthetic),
			"Deprecated" => (data, AttributeInfo::Deprecated),
			_ => (
				data,
				AttributeInfo::Unknown {
					name: name.to_string(),
					length,
				},
			),
		};

		Ok((input, attribute))
	}
}
