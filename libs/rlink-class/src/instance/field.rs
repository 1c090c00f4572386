use eyre::ContextCompat;
use rlink_core::{FieldAccessFlags, Storage, StorageValue, Type};
use rlink_reader::{ConstantPool, FieldInfo};
use std::ops::Deref;

pub struct ClassFields {
	storage: Storage<String, Field>,
}

impl ClassFields {
	pub fn new(fields: Vec<Field>) -> Self {
		let mut storage = Storage::new();
		for field in fields {
			storage.insert(field.name.clone(), field);
		}

		Self { storage }
	}
}

impl Deref for ClassFields {
	type Target = Storage<String, Field>;

	fn deref(&self) -> &Self::Target {
		&self.storage
	}
}

#[derive(Clone, Debug)]
pub struct Field {
	pub name: String,
	pub ty: Type,
	pub flags: FieldAccessFlags,
}

impl Field {
	pub fn parse(info: &FieldInfo, cp: &ConstantPool) -> eyre::Result<Field> {
		let name = cp
			.utf8(info.name_index)
			.wrap_err("Field name is not a Utf8 constant")?;
		let desc = cp
			.utf8(info.descriptor_index)
			.wrap_err_with(|| format!("in FIELD \"{name}\": descriptor is not a Utf8 constant"))?;
		let ty = Type::parse(desc)
			.wrap_err_with(|| format!("in FIELD \"{name}\": invalid descriptor {desc}"))?;

		Ok(Field {
			name: name.to_string(),
			ty,
			flags: info.access_flags,
		})
	}

	pub fn is_static(&self) -> bool {
		self.flags.contains(FieldAccessFlags::STATIC)
	}
}

impl StorageValue for Field {
	type Idx = u16;
}
