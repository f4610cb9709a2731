pub mod backtesting;
pub mod config;
pub mod confirm;
pub mod live;
pub mod shared;
