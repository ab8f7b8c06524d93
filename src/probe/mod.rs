//! Account probing
//!
//! ```text
//! ProbeOrchestrator::run(label)
//!   └─ ProviderRegistry::discover()
//!   └─ for each handle (in order): AccountProbe::probe(handle)
//!   └─ ProbeReport { context: label, origin, results }
//! ```

pub mod account;
pub mod orchestrator;
pub mod types;

pub use account::{AccountProbe, ProbeOutcome};
pub use orchestrator::ProbeOrchestrator;
pub use types::{ProbeReport, ProbeResult, NO_PROVIDERS_ERROR, NO_PROVIDERS_WALLET};
