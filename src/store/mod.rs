pub mod sqlite;

pub use sqlite::{ReportStore, StoreError};
