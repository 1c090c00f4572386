use crate::error::ConstraintViolation;
use dashmap::DashMap;
use rlink_class::LoadedClass;
use rlink_core::LoaderId;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConstraintState {
	/// At least one participant has not resolved the name yet.
	Pending,
	/// Every participant resolved the name to the same class.
	Satisfied,
	/// Two participants were already bound to different classes. Never left again.
	Violated,
}

struct Participant {
	loader: LoaderId,
	context: Arc<str>,
	resolved: bool,
}

struct ConstraintEntry {
	participants: Vec<Participant>,
	/// The class every participant has to agree on, once one of them resolved the name.
	class: Option<Weak<LoadedClass>>,
	state: ConstraintState,
}

impl ConstraintEntry {
	fn is_live(&self) -> bool {
		self.state != ConstraintState::Violated
	}

	fn contains(&self, loader: LoaderId) -> bool {
		self.participants.iter().any(|v| v.loader == loader)
	}

	fn agreed(&self) -> Option<Arc<LoadedClass>> {
		self.class.as_ref()?.upgrade()
	}

	fn join(&mut self, loader: LoaderId, context: &Arc<str>, resolved: bool) {
		match self.participants.iter_mut().find(|v| v.loader == loader) {
			Some(participant) => participant.resolved |= resolved,
			None => self.participants.push(Participant {
				loader,
				context: context.clone(),
				resolved,
			}),
		}
	}

	fn refresh(&mut self) {
		if self.is_live() {
			let done = self.agreed().is_some() && self.participants.iter().all(|v| v.resolved);
			self.state = if done {
				ConstraintState::Satisfied
			} else {
				ConstraintState::Pending
			};
		}
	}
}

/// A point in time view of one constraint.
#[derive(Clone, Debug)]
pub struct ConstraintSnapshot {
	pub loaders: Vec<LoaderId>,
	pub contexts: Vec<Arc<str>>,
	pub class: Option<Arc<LoadedClass>>,
	pub state: ConstraintState,
}

/// Loader constraints, sharded by class name so unrelated names never contend.
///
/// Each name maps to a list of disjoint loader sets. Loaders in one set must see the same class
/// for the name. Classes are held weakly, an unloaded class releases its constraints.
#[derive(Default)]
pub struct ConstraintTable {
	entries: DashMap<String, Vec<ConstraintEntry>>,
}

impl ConstraintTable {
	pub fn new() -> ConstraintTable {
		ConstraintTable::default()
	}

	/// Requires `a` and `b` to agree on `name`. `resolved_a` and `resolved_b` are what each loader
	/// currently sees, if anything. The outcome does not depend on the order of the two sides.
	pub fn add_constraint(
		&self,
		name: &str,
		a: LoaderId,
		resolved_a: Option<&Arc<LoadedClass>>,
		b: LoaderId,
		resolved_b: Option<&Arc<LoadedClass>>,
		context: &str,
	) -> Result<(), ConstraintViolation> {
		let mut entries = self.entries.entry(name.to_string()).or_default();
		add_to(&mut entries, name, (a, resolved_a), (b, resolved_b), context)
	}

	/// [`ConstraintTable::add_constraint`], with `seen` asked what each loader sees while no class
	/// can be published under `name`.
	pub fn add_constraint_with(
		&self,
		name: &str,
		a: LoaderId,
		b: LoaderId,
		context: &str,
		seen: impl Fn(LoaderId) -> Option<Arc<LoadedClass>>,
	) -> Result<(), ConstraintViolation> {
		let mut entries = self.entries.entry(name.to_string()).or_default();
		let (resolved_a, resolved_b) = (seen(a), seen(b));
		add_to(
			&mut entries,
			name,
			(a, resolved_a.as_ref()),
			(b, resolved_b.as_ref()),
			context,
		)
	}

	/// Called when `loader` starts seeing `class` under `name`. Fails when a constraint binds the
	/// loader to a different class, in which case nothing is recorded.
	pub fn resolve_pending(
		&self,
		name: &str,
		loader: LoaderId,
		class: &Arc<LoadedClass>,
	) -> Result<(), ConstraintViolation> {
		let Some(mut entries) = self.entries.get_mut(name) else {
			return Ok(());
		};
		check_pending(&entries, name, loader, class)?;
		mark_resolved(&mut entries, loader, class);
		Ok(())
	}

	/// [`ConstraintTable::resolve_pending`], running `record` before any constraint on `name` can
	/// change again. `record` is what makes `class` visible to `loader`, the constraints only
	/// take the class when it succeeds.
	pub fn resolve_pending_with<T, E>(
		&self,
		name: &str,
		loader: LoaderId,
		class: &Arc<LoadedClass>,
		record: impl FnOnce() -> Result<T, E>,
	) -> Result<Result<T, E>, ConstraintViolation> {
		let mut entries = self.entries.entry(name.to_string()).or_default();
		check_pending(&entries, name, loader, class)?;
		let recorded = record();
		if recorded.is_ok() {
			mark_resolved(&mut entries, loader, class);
		}

		let unused = entries.is_empty();
		drop(entries);
		if unused {
			self.entries.remove_if(name, |_, entries| entries.is_empty());
		}
		Ok(recorded)
	}

	/// Drops every trace of an unloaded loader. Sets left with a single loader constrain nothing.
	pub fn purge_loader(&self, loader: LoaderId) {
		self.entries.retain(|_, entries| {
			entries.retain_mut(|entry| {
				entry.participants.retain(|v| v.loader != loader);
				if entry.class.as_ref().is_some_and(|v| v.strong_count() == 0) {
					entry.class = None;
				}
				entry.refresh();
				entry.participants.len() > 1
			});
			!entries.is_empty()
		});
	}

	pub fn constraints_for(&self, name: &str) -> Vec<ConstraintSnapshot> {
		let Some(entries) = self.entries.get(name) else {
			return vec![];
		};
		entries
			.iter()
			.map(|entry| ConstraintSnapshot {
				loaders: entry.participants.iter().map(|v| v.loader).collect(),
				contexts: entry.participants.iter().map(|v| v.context.clone()).collect(),
				class: entry.agreed(),
				state: entry.state,
			})
			.collect()
	}

	/// The state of the constraint set `loader` belongs to for `name`.
	pub fn state(&self, name: &str, loader: LoaderId) -> Option<ConstraintState> {
		let entries = self.entries.get(name)?;
		let entry = entries.iter().find(|v| v.is_live() && v.contains(loader))?;
		Some(entry.state)
	}

	pub fn len(&self) -> usize {
		self.entries.iter().map(|v| v.value().len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn add_to(
	entries: &mut Vec<ConstraintEntry>,
	name: &str,
	(a, resolved_a): (LoaderId, Option<&Arc<LoadedClass>>),
	(b, resolved_b): (LoaderId, Option<&Arc<LoadedClass>>),
	context: &str,
) -> Result<(), ConstraintViolation> {
	let context: Arc<str> = Arc::from(context);

	if let (Some(x), Some(y)) = (resolved_a, resolved_b) {
		if !Arc::ptr_eq(x, y) {
			debug!(target: "constraints", "{name}: {a} and {b} already disagree");
			// One record per pair, repeated checks of the same conflict add nothing.
			let recorded = entries
				.iter()
				.any(|v| !v.is_live() && v.contains(a) && v.contains(b));
			if !recorded {
				entries.push(ConstraintEntry {
					participants: vec![
						Participant {
							loader: a,
							context: context.clone(),
							resolved: true,
						},
						Participant {
							loader: b,
							context,
							resolved: true,
						},
					],
					class: None,
					state: ConstraintState::Violated,
				});
			}
			return Err(ConstraintViolation::new(name, a, b));
		}
	}

	let index_a = entries.iter().position(|v| v.is_live() && v.contains(a));
	let index_b = entries.iter().position(|v| v.is_live() && v.contains(b));
	let agreed_a = index_a.and_then(|i| entries[i].agreed());
	let agreed_b = index_b.and_then(|i| entries[i].agreed());

	// Everything both loader sets and both sides currently know about the name.
	let known = [
		(a, resolved_a.cloned()),
		(b, resolved_b.cloned()),
		(a, agreed_a),
		(b, agreed_b),
	];
	let mut agreed: Option<(LoaderId, Arc<LoadedClass>)> = None;
	for (loader, class) in known {
		let Some(class) = class else {
			continue;
		};
		if let Some((first, existing)) = &agreed {
			if !Arc::ptr_eq(existing, &class) {
				debug!(target: "constraints", "{name}: {first} and {loader} would have to merge different classes");
				let (first, other) = if *first == a { (a, b) } else { (b, a) };
				return Err(ConstraintViolation::new(name, first, other));
			}
			continue;
		}
		agreed = Some((loader, class));
	}

	let index = match (index_a, index_b) {
		(Some(x), Some(y)) if x != y => {
			let (keep, remove) = (x.min(y), x.max(y));
			let removed = entries.remove(remove);
			for participant in removed.participants {
				entries[keep].join(participant.loader, &participant.context, participant.resolved);
			}
			keep
		}
		(Some(x), _) | (None, Some(x)) => x,
		(None, None) => {
			entries.push(ConstraintEntry {
				participants: vec![],
				class: None,
				state: ConstraintState::Pending,
			});
			entries.len() - 1
		}
	};

	let entry = &mut entries[index];
	entry.join(a, &context, resolved_a.is_some());
	entry.join(b, &context, resolved_b.is_some());
	if let Some((_, class)) = agreed {
		entry.class = Some(Arc::downgrade(&class));
	}
	entry.refresh();
	trace!(target: "constraints", "{name}: {a} = {b} is {:?}", entry.state);
	Ok(())
}

fn check_pending(
	entries: &[ConstraintEntry],
	name: &str,
	loader: LoaderId,
	class: &Arc<LoadedClass>,
) -> Result<(), ConstraintViolation> {
	for entry in entries.iter().filter(|v| v.is_live() && v.contains(loader)) {
		if let Some(agreed) = entry.agreed() {
			if !Arc::ptr_eq(&agreed, class) {
				debug!(target: "constraints", "{name}: {loader} wants a different class than {}", agreed.loader);
				return Err(ConstraintViolation::new(name, loader, agreed.loader));
			}
		}
	}
	Ok(())
}

fn mark_resolved(entries: &mut [ConstraintEntry], loader: LoaderId, class: &Arc<LoadedClass>) {
	for entry in entries.iter_mut().filter(|v| v.is_live() && v.contains(loader)) {
		if entry.agreed().is_none() {
			entry.class = Some(Arc::downgrade(class));
		}
		for participant in entry.participants.iter_mut().filter(|v| v.loader == loader) {
			participant.resolved = true;
		}
		entry.refresh();
	}
}
