use std::fmt::{Display, Formatter};

use crate::{ObjectType, Type};

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct MethodDescriptor {
	pub parameters: Vec<Type>,
	pub returns: Option<Type>,
}

impl MethodDescriptor {
	pub fn parse(desc: &str) -> Option<MethodDescriptor> {
		if !desc.starts_with('(') {
			return None;
		}

		let end = desc.find(')')?;
		let mut remaining = &desc[1..end];
		let mut parameters = Vec::new();

		let ret_desc = &desc[end + 1..];
		let returns = if ret_desc == "V" {
			None
		} else {
			Some(Type::parse(ret_desc)?)
		};

		while !remaining.is_empty() {
			let (parameter, size) = Type::parse_len(remaining)?;
			parameters.push(parameter);
			remaining = &remaining[size..];
		}

		Some(MethodDescriptor {
			parameters,
			returns,
		})
	}

	/// Every class named in the signature, return type first, each name once.
	pub fn referenced_classes(&self) -> Vec<&ObjectType> {
		let mut output: Vec<&ObjectType> = Vec::new();
		let types = self.returns.iter().chain(self.parameters.iter());
		for name in types.filter_map(Type::class_name) {
			if !output.contains(&name) {
				output.push(name);
			}
		}
		output
	}

	/// The return type as written in Java source.
	pub fn external_return(&self) -> String {
		match &self.returns {
			None => "void".to_string(),
			Some(ty) => ty.external_name(),
		}
	}

	/// The parameter list as written in Java source, `(int, java.lang.String)`.
	pub fn external_parameters(&self) -> String {
		let parameters: Vec<String> = self.parameters.iter().map(Type::external_name).collect();
		format!("({})", parameters.join(", "))
	}
}

impl Display for MethodDescriptor {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "(")?;
		for ty in &self.parameters {
			write!(f, "{ty}")?;
		}
		write!(f, ")")?;
		match &self.returns {
			None => {
				write!(f, "V")
			}
			Some(ty) => {
				write!(f, "{ty}")
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PrimitiveType;

	#[test]
	fn parse_method() {
		assert_eq!(
			MethodDescriptor::parse("(IDLjava/lang/Thread;)Ljava/lang/Object;"),
			Some(MethodDescriptor {
				parameters: vec![
					Type::Primitive(PrimitiveType::Int),
					Type::Primitive(PrimitiveType::Double),
					Type::Object(ObjectType::new("java/lang/Thread")),
				],
				returns: Some(Type::Object(ObjectType::object())),
			})
		);
		assert_eq!(MethodDescriptor::parse("()"), None);
		assert_eq!(MethodDescriptor::parse("V"), None);
	}

	#[test]
	fn referenced_classes_are_unique() {
		let desc = MethodDescriptor::parse("(Ltest/Foo;[Ltest/Foo;I)Ltest/Bar;").unwrap();
		let names: Vec<&str> = desc.referenced_classes().into_iter().map(|v| &**v).collect();
		assert_eq!(names, vec!["test/Bar", "test/Foo"]);
	}

	#[test]
	fn external_forms() {
		let desc = MethodDescriptor::parse("(I[Ljava/lang/String;)Ltest/Foo;").unwrap();
		assert_eq!(desc.external_return(), "test.Foo");
		assert_eq!(desc.external_parameters(), "(int, java.lang.String[])");
		assert_eq!(desc.to_string(), "(I[Ljava/lang/String;)Ltest/Foo;");
	}
}
