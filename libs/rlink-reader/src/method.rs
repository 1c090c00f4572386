use crate::attribute::AttributeInfo;
use crate::consts::ConstantPool;
use crate::{be_cp, ConstPtr, IResult, UTF8Const};
use nom::combinator::map;
use nom::number::complete::be_u16;
use rlink_core::MethodAccessFlags;

#[derive(Clone, Debug)]
pub struct MethodInfo {
	pub access_flags: MethodAccessFlags,
	pub name_index: ConstPtr<UTF8Const>,
	pub descriptor_index: ConstPtr<UTF8Const>,
	pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
	pub fn parse<'a>(input: &'a [u8], constant_pool: &ConstantPool) -> IResult<'a, Self> {
		let (input, access_flags) = map(be_u16, MethodAccessFlags::from_bits_retain)(input)?;
		let (input, name_index) = be_cp(input)?;
		let (input, descriptor_index) = be_cp(input)?;
		let (input, attributes) = AttributeInfo::parse_list(input, constant_pool)?;

		Ok((
			input,
			Self {
				access_flags,
				name_index,
				descriptor_index,
				attributes,
			},
		))
	}
}
