//! Configuration loading and schema

pub mod file_config;
pub mod loader;

pub use file_config::{ConvergenceConfig, FileConfig, ProviderSettings, ProvidersConfig, RunConfig};
pub use loader::ConfigLoader;
