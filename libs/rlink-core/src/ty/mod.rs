use std::fmt::{Display, Formatter, Write};
use std::ops::Deref;

pub use descriptor::*;

mod descriptor;

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Type {
	Primitive(PrimitiveType),
	Object(ObjectType),
	Array(Box<ArrayType>),
}

impl Type {
	pub fn parse(desc: &str) -> Option<Type> {
		match Self::parse_len(desc) {
			Some((ty, len)) if len == desc.len() => Some(ty),
			_ => None,
		}
	}

	pub fn parse_len(desc: &str) -> Option<(Type, usize)> {
		match *desc.as_bytes().first()? {
			b'L' => ObjectType::parse_len(desc).map(|(ty, l)| (Type::Object(ty), l)),
			b'[' => ArrayType::parse_len(desc).map(|(ty, l)| (Type::Array(Box::new(ty)), l)),
			_ => PrimitiveType::parse(desc).map(|v| (Type::Primitive(v), 1)),
		}
	}

	/// The class named by this type once all array dimensions are stripped.
	pub fn class_name(&self) -> Option<&ObjectType> {
		match self {
			Type::Primitive(_) => None,
			Type::Object(ty) => Some(ty),
			Type::Array(array) => array.component.class_name(),
		}
	}

	/// Java source style name, `java.lang.String[]`.
	pub fn external_name(&self) -> String {
		match self {
			Type::Primitive(prim) => prim.keyword().to_string(),
			Type::Object(ty) => ty.external_name(),
			Type::Array(array) => format!("{}[]", array.component.external_name()),
		}
	}
}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Type::Primitive(v) => v.fmt(f),
			Type::Object(v) => v.fmt(f),
			Type::Array(v) => v.fmt(f),
		}
	}
}

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum PrimitiveType {
	Boolean,
	Byte,
	Short,
	Int,
	Long,
	Char,
	Float,
	Double,
}

impl PrimitiveType {
	pub fn parse(desc: &str) -> Option<PrimitiveType> {
		Some(match *desc.as_bytes().first()? {
			b'Z' => PrimitiveType::Boolean,
			b'B' => PrimitiveType::Byte,
			b'C' => PrimitiveType::Char,
			b'D' => PrimitiveType::Double,
			b'F' => PrimitiveType::Float,
			b'I' => PrimitiveType::Int,
			b'J' => PrimitiveType::Long,
			b'S' => PrimitiveType::Short,
			_ => {
				return None;
			}
		})
	}

	pub fn char(&self) -> char {
		match self {
			PrimitiveType::Boolean => 'Z',
			PrimitiveType::Byte => 'B',
			PrimitiveType::Short => 'S',
			PrimitiveType::Int => 'I',
			PrimitiveType::Long => 'J',
			PrimitiveType::Char => 'C',
			PrimitiveType::Float => 'F',
			PrimitiveType::Double => 'D',
		}
	}

	pub fn keyword(&self) -> &'static str {
		match self {
			PrimitiveType::Boolean => "boolean",
			PrimitiveType::Byte => "byte",
			PrimitiveType::Short => "short",
			PrimitiveType::Int => "int",
			PrimitiveType::Long => "long",
			PrimitiveType::Char => "char",
			PrimitiveType::Float => "float",
			PrimitiveType::Double => "double",
		}
	}
}

impl Display for PrimitiveType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_char(self.char())
	}
}

/// A class or interface in internal form (`java/lang/Object`).
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct ObjectType {
	pub name: String,
}

impl ObjectType {
	pub fn new(name: impl Into<String>) -> ObjectType {
		ObjectType { name: name.into() }
	}

	/// Accepts `java.lang.Object` as well as `java/lang/Object`.
	pub fn from_external(name: &str) -> ObjectType {
		ObjectType {
			name: name.replace('.', "/"),
		}
	}

	pub fn object() -> ObjectType {
		ObjectType::new("java/lang/Object")
	}

	pub fn parse_len(string: &str) -> Option<(ObjectType, usize)> {
		if *string.as_bytes().first()? != b'L' {
			return None;
		}

		let end = string.find(';')?;
		if end == 1 {
			return None;
		}

		Some((
			ObjectType {
				name: string[1..end].to_string(),
			},
			end + 1,
		))
	}

	pub fn external_name(&self) -> String {
		self.name.replace('/', ".")
	}

	/// A name is valid when it has no empty segments and none of the characters the JVM forbids.
	pub fn is_valid_name(name: &str) -> bool {
		!name.is_empty()
			&& name
				.split('/')
				.all(|segment| !segment.is_empty() && !segment.contains(['.', ';', '[']))
	}
}

impl Deref for ObjectType {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.name
	}
}

impl Display for ObjectType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_char('L')?;
		f.write_str(&self.name)?;
		f.write_char(';')
	}
}

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct ArrayType {
	pub component: Type,
}

impl ArrayType {
	pub fn parse_len(string: &str) -> Option<(ArrayType, usize)> {
		if *string.as_bytes().first()? != b'[' {
			return None;
		}

		let (component, length) = Type::parse_len(&string[1..])?;
		Some((ArrayType { component }, length + 1))
	}

	pub fn component(&self) -> &Type {
		&self.component
	}
}

impl Display for ArrayType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_char('[')?;
		self.component.fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_object() {
		assert_eq!(
			Type::parse("Ljava/lang/Object;"),
			Some(Type::Object(ObjectType::object()))
		);
		assert_eq!(Type::parse("L;"), None);
		assert_eq!(Type::parse("Ljava/lang/Object;I"), None);
	}

	#[test]
	fn parse_array() {
		let ty = Type::parse("[[Ltest/Foo;").unwrap();
		assert_eq!(ty.class_name(), Some(&ObjectType::new("test/Foo")));
		assert_eq!(ty.external_name(), "test.Foo[][]");
		assert_eq!(ty.to_string(), "[[Ltest/Foo;");
	}

	#[test]
	fn external_names() {
		assert_eq!(ObjectType::from_external("test.Foo").name, "test/Foo");
		assert_eq!(ObjectType::new("test/Foo").external_name(), "test.Foo");
		assert!(ObjectType::is_valid_name("java/lang/Object"));
		assert!(!ObjectType::is_valid_name("java//Object"));
		assert!(!ObjectType::is_valid_name("java.lang.Object"));
	}
}
