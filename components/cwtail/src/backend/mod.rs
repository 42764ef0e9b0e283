//! Log-storage backends and the data they return.

pub mod client;
pub mod cloudwatch;
pub mod memory;
pub mod models;
