use nom::bytes::complete::take;
use nom::error::context;
use nom::multi::length_count;
use nom::number::complete::{be_u16, be_u32};

use crate::attribute::{AttributeException, AttributeInfo};
use crate::consts::ConstantPool;
use crate::IResult;

/// The `Code` attribute of a method. The bytecode is kept as raw bytes, decoding it is the
/// interpreter's job and not needed for loading or linking.
#[derive(Clone, Debug)]
pub struct Code {
	pub max_stack: u16,
	pub max_locals: u16,
	pub code: Vec<u8>,
	pub exception_table: Vec<AttributeException>,
	pub attribute_info: Vec<AttributeInfo>,
}

impl Code {
	pub fn parse<'a>(input: &'a [u8], constant_pool: &ConstantPool) -> IResult<'a, Self> {
		let (input, max_stack) = be_u16(input)?;
		let (input, max_locals) = be_u16(input)?;
		let (input, code_length) = be_u32(input)?;
		let (input, code) = context("Bytecode", take(code_length))(input)?;

		let (input, exception_table) = length_count(be_u16, AttributeException::parse)(input)?;
		let (input, attribute_info) = AttributeInfo::parse_list(input, constant_pool)?;

		Ok((
			input,
			Code {
				max_stack,
				max_locals,
				code: code.to_vec(),
				exception_table,
				attribute_info,
			},
		))
	}
}
