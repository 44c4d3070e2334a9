pub mod memory;
pub mod postgres;
pub mod record_store;

pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;
pub use record_store::{DeleteScope, RecordQuery, RecordStore, SortOrder, StoreError, UpsertOutcome};
