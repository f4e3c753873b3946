//! Ports: interfaces the domain exposes to infrastructure adapters.

pub mod generator;

pub use generator::{Generator, ProviderError, ProviderResult};
