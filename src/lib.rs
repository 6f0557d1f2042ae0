// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod jalali;
pub mod metrics;
pub mod scheduler;
pub mod snapshot;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::{AppConfig, Language, ScrapeConfig};
pub use crate::metrics::Exporter;
pub use crate::snapshot::{MatchRecord, Snapshot, SnapshotStore};
