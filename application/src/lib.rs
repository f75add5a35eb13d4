//! Application layer for meld
//!
//! Use cases and ports. The orchestrator composes the advisor pool, the
//! melder, and the convergence engine behind three ports: provider
//! adapters, the session store, and the event sink. Implementations live
//! in the infrastructure layer and are injected by the binary.

pub mod config;
pub mod ports;
pub mod use_cases;

pub use config::RunParams;
pub use ports::event_sink::{EventSink, NullSink};
pub use ports::provider_adapter::{
    InvocationOutput, InvocationRequest, ProbeReport, ProviderAdapter,
};
pub use ports::session_store::{RunSummary, SessionStore, StoreError};
pub use use_cases::advisor_pool::{AdvisorPool, PoolError};
pub use use_cases::melder::{Melder, MelderError};
pub use use_cases::orchestrator::{OrchestrateError, Orchestrator};
pub use use_cases::retry::invoke_with_retry;
