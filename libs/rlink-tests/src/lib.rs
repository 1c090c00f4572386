//! End to end scenarios for class resolution. The fixtures in [`testing`] build small class
//! hierarchies in memory and wrap class sources to observe how they are used.

pub mod testing;
#[cfg(test)]
mod tests;
