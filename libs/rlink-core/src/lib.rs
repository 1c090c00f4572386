mod config;
mod flags;
mod loader_id;
mod storage;
mod ty;
mod utils;

pub use config::*;
pub use flags::*;
pub use loader_id::*;
pub use storage::*;
pub use ty::*;
pub use utils::*;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static START: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once, only the first call wins.
pub fn init() {
	init_with(Level::INFO);
}

pub fn init_with(level: Level) {
	START.call_once(|| {
		let filter = filter::Targets::new()
			.with_default(level)
			.with_target("archive", level)
			.with_target("constraints", level);
		let layered = tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer())
			.with(filter);

		// Someone else (a test harness, an embedder) may already own the global subscriber.
		let _ = layered.try_init();
	});
}
