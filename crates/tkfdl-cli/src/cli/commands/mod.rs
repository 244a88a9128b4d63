//! CLI command handlers, one per file.

mod bridge;
mod fetch;
mod pool_demo;
mod prefs;
mod probe;
mod resolve;
mod stack;

pub use bridge::run_bridge;
pub use fetch::run_fetch;
pub use pool_demo::run_pool_demo;
pub use prefs::run_prefs;
pub use probe::run_probe;
pub use resolve::run_resolve;
