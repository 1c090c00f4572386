use crate::error::ArchiveError;
use nom::bytes::complete::take;
use nom::combinator::{map, map_res};
use nom::error::context;
use nom::multi::{length_count, length_data};
use nom::number::complete::{be_u16, be_u32, be_u8};
use rlink_class::{ClassParts, CodeBytes, Field, Method, MethodCode, SharedBytes};
use rlink_core::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, MethodDescriptor, ObjectType, Type};
use rlink_reader::IResult;
use std::ops::Range;

// class_record {
//     u16   flags;
//     str   name;
//     u8    has_super; [str super]
//     u16   interfaces_count; str interfaces[];
//     u16   fields_count; { u16 flags; str name; str descriptor; } fields[];
//     u16   methods_count; {
//         u16 flags; str name; str descriptor;
//         u8  has_code; [u16 max_stack; u16 max_locals; u32 length; u8 code[length]]
//     } methods[];
// }
// where str is a u16 length followed by UTF-8.
pub(crate) struct ClassRecord {
	flags: u16,
	name: String,
	superclass: Option<String>,
	interfaces: Vec<String>,
	fields: Vec<(u16, String, String)>,
	methods: Vec<MethodRecord>,
}

struct MethodRecord {
	flags: u16,
	name: String,
	descriptor: String,
	/// Bytecode location as an absolute range into the archive.
	code: Option<(u16, u16, Range<usize>)>,
}

impl ClassRecord {
	/// `base` is the offset of `input` inside the archive, needed to locate bytecode.
	pub(crate) fn parse(input: &[u8], base: usize) -> IResult<'_, ClassRecord> {
		let start = input.len();
		let (input, flags) = be_u16(input)?;
		let (input, name) = context("Class name", be_str)(input)?;
		let (input, has_super) = be_u8(input)?;
		let (input, superclass) = match has_super {
			0 => (input, None),
			_ => map(be_str, Some)(input)?,
		};
		let (input, interfaces) = context("Interfaces", length_count(be_u16, be_str))(input)?;
		let (input, fields) = context(
			"Fields",
			length_count(be_u16, |input| {
				let (input, flags) = be_u16(input)?;
				let (input, name) = be_str(input)?;
				let (input, descriptor) = be_str(input)?;
				Ok((input, (flags, name, descriptor)))
			}),
		)(input)?;

		let (mut input, count) = be_u16(input)?;
		let mut methods = Vec::with_capacity(count as usize);
		for _ in 0..count {
			let (remaining, flags) = be_u16(input)?;
			let (remaining, name) = context("Method name", be_str)(remaining)?;
			let (remaining, descriptor) = be_str(remaining)?;
			let (remaining, has_code) = be_u8(remaining)?;
			let (remaining, code) = if has_code == 0 {
				(remaining, None)
			} else {
				let (remaining, max_stack) = be_u16(remaining)?;
				let (remaining, max_locals) = be_u16(remaining)?;
				let (remaining, length) = be_u32(remaining)?;
				let code_start = base + (start - remaining.len());
				let (remaining, _) = context("Bytecode", take(length))(remaining)?;
				let range = code_start..code_start + length as usize;
				(remaining, Some((max_stack, max_locals, range)))
			};
			methods.push(MethodRecord {
				flags,
				name,
				descriptor,
				code,
			});
			input = remaining;
		}

		Ok((
			input,
			ClassRecord {
				flags,
				name,
				superclass,
				interfaces,
				fields,
				methods,
			},
		))
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	/// Bytecode is not copied, methods keep a window into `data`.
	pub(crate) fn to_parts(&self, data: &SharedBytes, checksum: u32) -> Result<ClassParts, ArchiveError> {
		let corrupt = |what: String| ArchiveError::Corrupt(format!("{}: {what}", self.name));

		let mut fields = Vec::with_capacity(self.fields.len());
		for (flags, name, descriptor) in &self.fields {
			let ty = Type::parse(descriptor)
				.ok_or_else(|| corrupt(format!("field {name} has descriptor {descriptor}")))?;
			fields.push(Field {
				name: name.clone(),
				ty,
				flags: FieldAccessFlags::from_bits_retain(*flags),
			});
		}

		let mut methods = Vec::with_capacity(self.methods.len());
		for method in &self.methods {
			let desc = MethodDescriptor::parse(&method.descriptor).ok_or_else(|| {
				corrupt(format!("method {} has descriptor {}", method.name, method.descriptor))
			})?;
			let code = match &method.code {
				None => None,
				Some((max_stack, max_locals, range)) => {
					let bytes = CodeBytes::shared(data.clone(), range.clone())
						.ok_or_else(|| corrupt(format!("code of {} is out of bounds", method.name)))?;
					Some(MethodCode {
						max_stack: *max_stack,
						max_locals: *max_locals,
						bytes,
					})
				}
			};
			methods.push(Method {
				name: method.name.clone(),
				desc,
				flags: MethodAccessFlags::from_bits_retain(method.flags),
				code,
			});
		}

		Ok(ClassParts {
			name: ObjectType::new(self.name.clone()),
			flags: ClassAccessFlags::from_bits_retain(self.flags),
			superclass: self.superclass.clone().map(ObjectType::new),
			interfaces: self.interfaces.iter().cloned().map(ObjectType::new).collect(),
			methods,
			fields,
			checksum,
		})
	}

	pub(crate) fn write(parts: &ClassParts, output: &mut Vec<u8>) {
		put_u16(output, parts.flags.bits());
		put_str(output, &parts.name);
		match &parts.superclass {
			None => output.push(0),
			Some(superclass) => {
				output.push(1);
				put_str(output, superclass);
			}
		}

		put_u16(output, parts.interfaces.len() as u16);
		for interface in &parts.interfaces {
			put_str(output, interface);
		}

		put_u16(output, parts.fields.len() as u16);
		for field in &parts.fields {
			put_u16(output, field.flags.bits());
			put_str(output, &field.name);
			put_str(output, &field.ty.to_string());
		}

		put_u16(output, parts.methods.len() as u16);
		for method in &parts.methods {
			put_u16(output, method.flags.bits());
			put_str(output, &method.name);
			put_str(output, &method.desc.to_string());
			match &method.code {
				None => output.push(0),
				Some(code) => {
					output.push(1);
					put_u16(output, code.max_stack);
					put_u16(output, code.max_locals);
					put_u32(output, code.bytes.len() as u32);
					output.extend_from_slice(code.bytes.as_slice());
				}
			}
		}
	}
}

pub(crate) fn be_str(input: &[u8]) -> IResult<'_, String> {
	map(map_res(length_data(be_u16), std::str::from_utf8), str::to_string)(input)
}

pub(crate) fn put_u16(output: &mut Vec<u8>, value: u16) {
	output.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(output: &mut Vec<u8>, value: u32) {
	output.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_str(output: &mut Vec<u8>, value: &str) {
	put_u16(output, value.len() as u16);
	output.extend_from_slice(value.as_bytes());
}
