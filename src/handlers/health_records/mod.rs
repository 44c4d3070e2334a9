pub mod delete_records;
pub mod get_records;
pub mod upsert_record;
