pub mod failover;
pub mod normalizer;
pub mod provider_client;
pub mod synthetic;
