//! Configuration loading and process shutdown.

pub mod load_config;
pub mod shutdown;
