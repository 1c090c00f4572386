use crate::attribute::AttributeInfo;
use crate::consts::ConstantPool;
use crate::{be_cp, ConstPtr, IResult, UTF8Const};
use nom::combinator::map;
use nom::number::complete::be_u16;
use rlink_core::FieldAccessFlags;

//field_info {
//     u16             access_flags;
//     u16             name_index;
//     u16             descriptor_index;
//     u16             attributes_count;
//     attribute_info attributes[attributes_count];
// }
#[derive(Clone, Debug)]
pub struct FieldInfo {
	pub access_flags: FieldAccessFlags,
	pub name_index: ConstPtr<UTF8Const>,
	pub descriptor_index: ConstPtr<UTF8Const>,
	pub attribute_info: Vec<AttributeInfo>,
}

impl FieldInfo {
	pub fn parse<'a>(input: &'a [u8], constant_pool: &ConstantPool) -> IResult<'a, Self> {
		let (input, access_flags) = map(be_u16, FieldAccessFlags::from_bits_retain)(input)?;
		let (input, name_index) = be_cp(input)?;
		let (input, descriptor_index) = be_cp(input)?;
		let (input, attribute_info) = AttributeInfo::parse_list(input, constant_pool)?;

		Ok((
			input,
			Self {
				access_flags,
				name_index,
				descriptor_index,
				attribute_info,
			},
		))
	}
}
