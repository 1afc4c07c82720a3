// airlink-core: Staged-write device proxy and single-flight polling coordination.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod proxy;

mod debounce;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::CoreError;
pub use proxy::StagingProxy;
