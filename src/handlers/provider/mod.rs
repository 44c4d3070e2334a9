pub mod provider_data;
pub mod settings;
pub mod sync;
