pub mod consolidation;
pub mod export;
pub mod ingest;
pub mod spool;

pub use consolidation::*;
pub use ingest::{load_calls, QueueFilter, QueueMatchMode};
pub use spool::CallsSpool;
