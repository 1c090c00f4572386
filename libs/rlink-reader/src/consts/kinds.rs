use crate::consts::ConstPtr;
use crate::impl_constant;

#[derive(Clone, Debug)]
pub struct UTF8Const(pub String);

impl UTF8Const {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl_constant!(UTF8 UTF8Const);

#[derive(Clone, Debug)]
pub struct ClassConst {
	pub name: ConstPtr<UTF8Const>,
}

impl_constant!(Class ClassConst);

#[derive(Clone, Debug)]
pub struct NameAndTypeConst {
	pub name: ConstPtr<UTF8Const>,
	pub descriptor: ConstPtr<UTF8Const>,
}

impl_constant!(NameAndType NameAndTypeConst);

#[derive(Clone, Debug)]
pub struct FieldConst {
	pub class: ConstPtr<ClassConst>,
	pub name_and_type: ConstPtr<NameAndTypeConst>,
}

impl_constant!(Field FieldConst);

#[derive(Clone, Debug)]
pub struct MethodConst {
	pub class: ConstPtr<ClassConst>,
	pub name_and_type: ConstPtr<NameAndTypeConst>,
}

impl_constant!(Method MethodConst);

#[derive(Clone, Debug)]
pub struct InterfaceConst {
	pub class: ConstPtr<ClassConst>,
	pub name_and_type: ConstPtr<NameAndTypeConst>,
}

impl_constant!(Interface InterfaceConst);

#[derive(Clone, Debug)]
pub struct StringConst {
	pub string: ConstPtr<UTF8Const>,
}

impl_constant!(String StringConst);

#[derive(Clone, Debug)]
pub struct IntegerConst {
	pub bytes: i32,
}

impl_constant!(Integer IntegerConst);

#[derive(Clone, Debug)]
pub struct FloatConst {
	pub bytes: f32,
}

impl_constant!(Float FloatConst);

#[derive(Clone, Debug)]
pub struct LongConst {
	pub bytes: i64,
}

impl_constant!(Long LongConst);

#[derive(Clone, Debug)]
pub struct DoubleConst {
	pub bytes: f64,
}

impl_constant!(Double DoubleConst);

#[derive(Clone, Debug)]
pub struct MethodHandleConst {
	pub reference_kind: u8,
	pub reference_index: u16,
}

impl_constant!(MethodHandle MethodHandleConst);

#[derive(Clone, Debug)]
pub struct MethodTypeConst {
	pub descriptor: ConstPtr<UTF8Const>,
}

impl_constant!(MethodType MethodTypeConst);

/// Shared by `CONSTANT_Dynamic` and `CONSTANT_InvokeDynamic`.
#[derive(Clone, Debug)]
pub struct DynamicConst {
	pub bootstrap_method_attr_index: u16,
	pub name_and_type: ConstPtr<NameAndTypeConst>,
}

#[derive(Clone, Debug)]
pub struct ModuleConst {
	pub name: ConstPtr<UTF8Const>,
}

impl_constant!(Module ModuleConst);

#[derive(Clone, Debug)]
pub struct PackageConst {
	pub name: ConstPtr<UTF8Const>,
}

impl_constant!(Package PackageConst);
