pub mod queries;
mod store;
mod types;

pub use store::{Store, UpsertOutcome};
pub use types::{Article, RunRecord, Source, StoreData, StoreError};
