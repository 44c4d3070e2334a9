pub mod jwt;
pub mod prediction;
pub mod provider;
pub mod settings;
