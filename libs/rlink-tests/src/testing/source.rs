use eyre::Result;
use rlink_core::ObjectType;
use rlink_loader::ClassSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts how often a source is asked, whether or not it knows the class.
pub struct CountingSource<S> {
	inner: S,
	calls: Arc<AtomicUsize>,
}

impl<S> CountingSource<S> {
	pub fn new(inner: S) -> CountingSource<S> {
		CountingSource {
			inner,
			calls: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn counter(&self) -> Counter {
		Counter(self.calls.clone())
	}
}

impl<S: ClassSource> ClassSource for CountingSource<S> {
	fn try_load(&self, ty: &ObjectType) -> Result<Option<Vec<u8>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.inner.try_load(ty)
	}
}

#[derive(Clone)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
	pub fn get(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}
}

/// Sleeps before every lookup.
pub struct SlowSource<S> {
	inner: S,
	delay: Duration,
}

impl<S> SlowSource<S> {
	pub fn new(inner: S, delay: Duration) -> SlowSource<S> {
		SlowSource { inner, delay }
	}
}

impl<S: ClassSource> ClassSource for SlowSource<S> {
	fn try_load(&self, ty: &ObjectType) -> Result<Option<Vec<u8>>> {
		std::thread::sleep(self.delay);
		self.inner.try_load(ty)
	}
}

/// A source backed by a closure, for sources that have to do something while they are asked.
pub struct FnSource<F>(pub F);

impl<F> ClassSource for FnSource<F>
where
	F: Fn(&ObjectType) -> Result<Option<Vec<u8>>> + Send + Sync,
{
	fn try_load(&self, ty: &ObjectType) -> Result<Option<Vec<u8>>> {
		(self.0)(ty)
	}
}
