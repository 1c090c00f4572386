use ahash::{HashMap, HashMapExt};
use num_traits::{NumCast, PrimInt, ToPrimitive};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An insertion ordered table which hands out dense ids for its values.
pub struct Storage<K: Hash + Eq + Debug, V: StorageValue> {
	lookup: HashMap<K, Id<V>>,
	values: Vec<V>,
}

impl<K: Hash + Eq + Debug, V: StorageValue> Storage<K, V> {
	pub fn new() -> Storage<K, V> {
		Storage {
			lookup: HashMap::new(),
			values: vec![],
		}
	}

	/// Inserts a value, replacing the previous value under the same key.
	pub fn insert(&mut self, key: K, value: V) -> Id<V> {
		match self.lookup.entry(key) {
			Entry::Occupied(entry) => {
				let idx = *entry.get();
				self.values[idx.index()] = value;
				idx
			}
			Entry::Vacant(entry) => {
				let idx = Id::new(self.values.len() + 1);
				entry.insert(idx);
				self.values.push(value);
				idx
			}
		}
	}

	pub fn contains<Q: ?Sized>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq,
	{
		self.lookup.contains_key(key)
	}

	pub fn get_id<Q: ?Sized>(&self, key: &Q) -> Option<Id<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq,
	{
		self.lookup.get(key).copied()
	}

	pub fn get_keyed<Q: ?Sized>(&self, key: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq,
	{
		let id = self.get_id(key)?;
		Some(self.get(id))
	}

	pub fn get(&self, id: Id<V>) -> &V {
		&self.values[id.index()]
	}

	pub fn get_mut(&mut self, id: Id<V>) -> &mut V {
		&mut self.values[id.index()]
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Values in insertion order.
	pub fn iter(&self) -> std::slice::Iter<'_, V> {
		self.values.iter()
	}
}

impl<K: Hash + Eq + Debug, V: StorageValue> Default for Storage<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

pub struct Id<V: StorageValue>(V::Idx, PhantomData<fn() -> V>);

impl<V: StorageValue> Id<V> {
	fn new(idx: usize) -> Id<V> {
		let idx = <V::Idx as NumCast>::from(idx).unwrap_or_else(|| {
			panic!("Storage overflowed its index type at {idx}");
		});
		Id(idx, PhantomData)
	}

	pub fn idx(&self) -> V::Idx {
		self.0
	}

	fn index(&self) -> usize {
		self.0.to_usize().unwrap_or(0).saturating_sub(1)
	}
}

impl<V: StorageValue> Clone for Id<V> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<V: StorageValue> Copy for Id<V> {}

impl<V: StorageValue> Debug for Id<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "Id<{}>", self.0)
	}
}

impl<V: StorageValue> PartialEq for Id<V> {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<V: StorageValue> Eq for Id<V> {}

impl<V: StorageValue> PartialOrd for Id<V> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<V: StorageValue> Ord for Id<V> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl<V: StorageValue> Hash for Id<V> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.hash(state)
	}
}

pub trait StorageValue {
	type Idx: PrimInt + Hash + Display;
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Value(u32);

	impl StorageValue for Value {
		type Idx = u16;
	}

	#[test]
	fn insert_replaces_under_same_key() {
		let mut storage: Storage<String, Value> = Storage::new();
		let first = storage.insert("a".to_string(), Value(1));
		let second = storage.insert("b".to_string(), Value(2));
		let replaced = storage.insert("a".to_string(), Value(3));

		assert_eq!(first, replaced);
		assert_ne!(first, second);
		assert_eq!(storage.len(), 2);
		assert_eq!(storage.get(first).0, 3);
		assert_eq!(storage.get_keyed("b").map(|v| v.0), Some(2));
		assert!(storage.get_keyed("c").is_none());
	}
}
