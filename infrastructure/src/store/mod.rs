//! Session persistence implementations

pub mod fs;
pub mod memory;
pub mod redact;

pub use fs::FsSessionStore;
pub use memory::MemorySessionStore;
pub use redact::redact_secrets;
