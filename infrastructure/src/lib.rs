//! Infrastructure layer for meld
//!
//! Concrete adapters behind the application ports: CLI provider adapters
//! with hard subprocess teardown guarantees, the filesystem session store
//! with atomic writes and secret redaction, figment-based configuration
//! loading, and the preflight probes.

pub mod config;
pub mod preflight;
pub mod providers;
pub mod store;

pub use config::{ConfigLoader, FileConfig};
pub use preflight::run_preflight;
pub use providers::{build_adapter, registry_names, CliAdapter};
pub use store::{redact_secrets, FsSessionStore, MemorySessionStore};
