pub mod aggregator;
pub mod insights;
pub mod prediction;
