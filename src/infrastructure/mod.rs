//! Infrastructure layer: configuration, logging, and provider adapters.

pub mod config;
pub mod logging;
pub mod providers;
