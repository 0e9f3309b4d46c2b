//! SQLite-backed persistence for stocktake: product and vendor tables,
//! the sync-run log, and the single-flight run registry.

pub mod error;
pub mod models;
pub mod registry;
pub mod store;

pub use error::StoreError;
pub use models::{
    BatchResult, RunOutcome, RunStatus, SyncRun, META_DRY_RUN, META_FILTER_YEAR,
    META_RETIRED_STUCK, META_TRIGGER,
};
pub use registry::{ActiveRun, RunRegistry, StartOutcome, DEFAULT_STUCK_THRESHOLD};
pub use store::{Store, StoreConfig};
