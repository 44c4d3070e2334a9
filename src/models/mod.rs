pub mod common;
pub mod health_record;
pub mod insight;
pub mod prediction;
pub mod provider_settings;
pub mod stats;
pub mod sync;
