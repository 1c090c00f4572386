use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use rlink_core::LoaderId;
use std::fmt::{Display, Formatter};
use std::thread::{self, ThreadId};
use tracing::trace;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
	Load,
	Link,
}

/// One unit of exclusive resolution work: loading or linking one name under one loader.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PlaceholderKey {
	pub name: String,
	pub loader: LoaderId,
	pub phase: Phase,
}

impl PlaceholderKey {
	pub fn new(name: &str, loader: LoaderId, phase: Phase) -> PlaceholderKey {
		PlaceholderKey {
			name: name.to_string(),
			loader,
			phase,
		}
	}
}

impl Display for PlaceholderKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let phase = match self.phase {
			Phase::Load => "loading",
			Phase::Link => "linking",
		};
		write!(f, "{phase} {} in {}", self.name, self.loader)
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PlaceholderError {
	/// The calling thread already owns the key further up its own stack.
	Circularity(PlaceholderKey),
	/// Waiting would close a cycle of threads waiting on each other.
	Deadlock {
		waiting: PlaceholderKey,
		held: PlaceholderKey,
	},
}

#[derive(Default)]
struct TableState {
	owners: AHashMap<PlaceholderKey, ThreadId>,
	waiting: AHashMap<ThreadId, PlaceholderKey>,
}

/// Per (name, loader, phase) ownership. One mutex guards the bookkeeping, it is never held while
/// the owner does its work, so unrelated keys do not wait on each other.
#[derive(Default)]
pub struct PlaceholderTable {
	state: Mutex<TableState>,
	released: Condvar,
}

impl PlaceholderTable {
	pub fn new() -> PlaceholderTable {
		PlaceholderTable::default()
	}

	/// Blocks until the key is free and takes it. The key is released when the guard drops.
	pub fn acquire(&self, key: PlaceholderKey) -> Result<PlaceholderGuard<'_>, PlaceholderError> {
		let me = thread::current().id();
		let mut state = self.state.lock();
		loop {
			let Some(owner) = state.owners.get(&key).copied() else {
				state.owners.insert(key.clone(), me);
				trace!("Placeholder {key} taken");
				return Ok(PlaceholderGuard { table: self, key });
			};

			if owner == me {
				return Err(PlaceholderError::Circularity(key));
			}

			// Follow the chain of owners and what they wait for, a loop back to this thread
			// would never wake up.
			let mut current = owner;
			for _ in 0..=state.waiting.len() {
				let Some(wanted) = state.waiting.get(&current) else {
					break;
				};
				let Some(next) = state.owners.get(wanted).copied() else {
					break;
				};
				if next == me {
					let held = wanted.clone();
					return Err(PlaceholderError::Deadlock { waiting: key, held });
				}
				current = next;
			}

			state.waiting.insert(me, key.clone());
			self.released.wait(&mut state);
			state.waiting.remove(&me);
		}
	}

	pub fn is_held(&self, key: &PlaceholderKey) -> bool {
		self.state.lock().owners.contains_key(key)
	}

	fn release(&self, key: &PlaceholderKey) {
		let mut state = self.state.lock();
		state.owners.remove(key);
		drop(state);
		trace!("Placeholder {key} released");
		self.released.notify_all();
	}
}

pub struct PlaceholderGuard<'a> {
	table: &'a PlaceholderTable,
	key: PlaceholderKey,
}

impl PlaceholderGuard<'_> {
	pub fn key(&self) -> &PlaceholderKey {
		&self.key
	}
}

impl Drop for PlaceholderGuard<'_> {
	fn drop(&mut self) {
		self.table.release(&self.key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::time::Duration;

	fn key(name: &str, loader: LoaderId) -> PlaceholderKey {
		PlaceholderKey::new(name, loader, Phase::Load)
	}

	#[test]
	fn same_thread_reentry_is_circular() {
		let table = PlaceholderTable::new();
		let loader = LoaderId::next();
		let guard = table.acquire(key("test/A", loader)).unwrap();
		assert_eq!(
			table.acquire(key("test/A", loader)).err(),
			Some(PlaceholderError::Circularity(key("test/A", loader)))
		);

		// Other names, loaders and phases are independent.
		let _b = table.acquire(key("test/B", loader)).unwrap();
		let _other = table.acquire(key("test/A", LoaderId::next())).unwrap();
		let _link = table.acquire(PlaceholderKey::new("test/A", loader, Phase::Link)).unwrap();

		drop(guard);
		assert!(!table.is_held(&key("test/A", loader)));
	}

	#[test]
	fn waiter_proceeds_after_release() {
		let table = Arc::new(PlaceholderTable::new());
		let loader = LoaderId::next();
		let guard = table.acquire(key("test/A", loader)).unwrap();

		let waiter = {
			let table = table.clone();
			std::thread::spawn(move || table.acquire(key("test/A", loader)).map(|_| ()))
		};
		std::thread::sleep(Duration::from_millis(50));
		assert!(!waiter.is_finished());
		drop(guard);
		assert_eq!(waiter.join().unwrap(), Ok(()));
	}

	#[test]
	fn crossed_waits_are_reported() {
		let table = Arc::new(PlaceholderTable::new());
		let loader = LoaderId::next();
		let a = key("test/A", loader);
		let b = key("test/B", loader);

		let (taken_tx, taken_rx) = crossbeam::channel::unbounded();
		let holder = {
			let table = table.clone();
			let (a, b) = (a.clone(), b.clone());
			std::thread::spawn(move || {
				let _a = table.acquire(a).unwrap();
				taken_tx.send(()).unwrap();
				// Blocks until the main thread gives up on `a`.
				table.acquire(b).map(|_| ())
			})
		};

		taken_rx.recv().unwrap();
		let guard_b = table.acquire(b.clone()).unwrap();
		while !table.state.lock().waiting.values().any(|v| *v == b) {
			std::thread::sleep(Duration::from_millis(1));
		}
		assert_eq!(
			table.acquire(a.clone()).err(),
			Some(PlaceholderError::Deadlock { waiting: a, held: b })
		);
		drop(guard_b);
		assert_eq!(holder.join().unwrap(), Ok(()));
	}
}
