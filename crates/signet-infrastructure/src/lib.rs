pub mod artifacts;
pub mod audit;
pub mod exchange;
pub mod features;
pub mod market_data;
pub mod models;
pub mod persistence;
