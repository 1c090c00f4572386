mod kinds;

pub use crate::consts::kinds::*;
use crate::IResult;
use nom::combinator::{map, map_opt};
use nom::error::context;
use nom::multi::length_data;
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u8};
use nom::sequence::pair;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use tracing::trace;

#[macro_export]
macro_rules! impl_constant {
	($VARIANT:ident $TY:ty) => {
		impl $crate::Constant for $TY {
			fn get(value: &$crate::ConstantInfo) -> Option<&Self> {
				if let $crate::ConstantInfo::$VARIANT(v) = value {
					return Some(v);
				}
				None
			}
		}
	};
}

pub trait Constant {
	fn get(value: &ConstantInfo) -> Option<&Self>;
}

pub struct ConstPtr<V: Constant>(u16, PhantomData<V>);

impl<V: Constant> ConstPtr<V> {
	pub fn new(id: u16) -> ConstPtr<V> {
		ConstPtr(id, PhantomData)
	}

	pub fn index(&self) -> u16 {
		self.0
	}

	pub fn is_null(&self) -> bool {
		self.0 == 0
	}

	pub fn get<'a>(&self, cp: &'a ConstantPool) -> Option<&'a V> {
		cp.get(*self)
	}
}

#[inline]
pub fn be_cp<V: Constant>(input: &[u8]) -> IResult<'_, ConstPtr<V>> {
	map(be_u16, ConstPtr::new)(input)
}

impl<V: Constant> Clone for ConstPtr<V> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<V: Constant> Copy for ConstPtr<V> {}

impl<V: Constant> Debug for ConstPtr<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum ConstantTag {
	Utf8 = 1,
	Integer = 3,
	Float = 4,
	Long = 5,
	Double = 6,
	Class = 7,
	String = 8,
	Field = 9,
	Method = 10,
	Interface = 11,
	NameAndType = 12,
	MethodHandle = 15,
	MethodType = 16,
	Dynamic = 17,
	InvokeDynamic = 18,
	Module = 19,
	Package = 20,
}

impl ConstantTag {
	/// Long and double constants take up two slots in the pool.
	pub fn is_wide(&self) -> bool {
		matches!(self, ConstantTag::Long | ConstantTag::Double)
	}
}

#[derive(Debug)]
pub struct ConstantPool(Vec<ConstantInfo>);

impl ConstantPool {
	pub fn new(values: Vec<ConstantInfo>) -> ConstantPool {
		ConstantPool(values)
	}

	pub fn parse(input: &[u8]) -> IResult<'_, ConstantPool> {
		let (mut input, count) = context("Constant pool count", be_u16)(input)?;
		let slots = count.saturating_sub(1) as usize;
		let mut values = Vec::with_capacity(slots);
		while values.len() < slots {
			let (remaining, (tag, info)) =
				context("Constant pool entry", ConstantInfo::parse)(input)?;
			trace!("cp_info {} {tag:?}", values.len() + 1);
			values.push(info);
			if tag.is_wide() {
				values.push(ConstantInfo::Unusable);
			}
			input = remaining;
		}

		Ok((input, ConstantPool(values)))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn raw_get(&self, index: u16) -> Option<&ConstantInfo> {
		if index == 0 {
			return None;
		}
		self.0.get(index as usize - 1)
	}

	pub fn get<V: Constant>(&self, ptr: ConstPtr<V>) -> Option<&V> {
		self.raw_get(ptr.0).and_then(V::get)
	}

	pub fn utf8(&self, ptr: ConstPtr<UTF8Const>) -> Option<&str> {
		self.get(ptr).map(UTF8Const::as_str)
	}

	pub fn class_name(&self, ptr: ConstPtr<ClassConst>) -> Option<&str> {
		let class = self.get(ptr)?;
		self.utf8(class.name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &ConstantInfo> {
		self.0.iter()
	}
}

#[derive(Debug)]
pub enum ConstantInfo {
	Class(ClassConst),
	Field(FieldConst),
	Method(MethodConst),
	Interface(InterfaceConst),
	String(StringConst),
	Integer(IntegerConst),
	Float(FloatConst),
	Long(LongConst),
	Double(DoubleConst),
	NameAndType(NameAndTypeConst),
	UTF8(UTF8Const),
	MethodHandle(MethodHandleConst),
	MethodType(MethodTypeConst),
	Dynamic(DynamicConst),
	InvokeDynamic(DynamicConst),
	Module(ModuleConst),
	Package(PackageConst),
	/// The second slot of a long or double.
	Unusable,
}

impl ConstantInfo {
	pub fn parse(input: &[u8]) -> IResult<'_, (ConstantTag, Self)> {
		let (input, tag) = context("Constant tag", map_opt(be_u8, ConstantTag::from_u8))(input)?;
		let (input, info) = match tag {
			ConstantTag::Utf8 => map_opt(length_data(be_u16), |data: &[u8]| {
				let data = mutf8::mutf8_to_utf8(data).ok()?;
				let string = String::from_utf8(data.to_vec()).ok()?;
				Some(ConstantInfo::UTF8(UTF8Const(string)))
			})(input),
			ConstantTag::Integer => map(be_i32, |bytes| {
				ConstantInfo::Integer(IntegerConst { bytes })
			})(input),
			ConstantTag::Float => {
				map(be_f32, |bytes| ConstantInfo::Float(FloatConst { bytes }))(input)
			}
			ConstantTag::Long => map(be_i64, |bytes| ConstantInfo::Long(LongConst { bytes }))(input),
			ConstantTag::Double => {
				map(be_f64, |bytes| ConstantInfo::Double(DoubleConst { bytes }))(input)
			}
			ConstantTag::Class => map(be_cp, |name| ConstantInfo::Class(ClassConst { name }))(input),
			ConstantTag::String => {
				map(be_cp, |string| ConstantInfo::String(StringConst { string }))(input)
			}
			ConstantTag::Field => map(pair(be_cp, be_cp), |(class, name_and_type)| {
				ConstantInfo::Field(FieldConst {
					class,
					name_and_type,
				})
			})(input),
			ConstantTag::Method => map(pair(be_cp, be_cp), |(class, name_and_type)| {
				ConstantInfo::Method(MethodConst {
					class,
					name_and_type,
				})
			})(input),
			ConstantTag::Interface => map(pair(be_cp, be_cp), |(class, name_and_type)| {
				ConstantInfo::Interface(InterfaceConst {
					class,
					name_and_type,
				})
			})(input),
			ConstantTag::NameAndType => map(pair(be_cp, be_cp), |(name, descriptor)| {
				ConstantInfo::NameAndType(NameAndTypeConst { name, descriptor })
			})(input),
			ConstantTag::MethodHandle => {
				map(pair(be_u8, be_u16), |(reference_kind, reference_index)| {
					ConstantInfo::MethodHandle(MethodHandleConst {
						reference_kind,
						reference_index,
					})
				})(input)
			}
			ConstantTag::MethodType => map(be_cp, |descriptor| {
				ConstantInfo::MethodType(MethodTypeConst { descriptor })
			})(input),
			ConstantTag::Dynamic | ConstantTag::InvokeDynamic => map(
				pair(be_u16, be_cp),
				|(bootstrap_method_attr_index, name_and_type)| {
					let value = DynamicConst {
						bootstrap_method_attr_index,
						name_and_type,
					};
					if tag == ConstantTag::Dynamic {
						ConstantInfo::Dynamic(value)
					} else {
						ConstantInfo::InvokeDynamic(value)
					}
				},
			)(input),
			ConstantTag::Module => {
				map(be_cp, |name| ConstantInfo::Module(ModuleConst { name }))(input)
			}
			ConstantTag::Package => {
				map(be_cp, |name| ConstantInfo::Package(PackageConst { name }))(input)
			}
		}?;

		Ok((input, (tag, info)))
	}
}
