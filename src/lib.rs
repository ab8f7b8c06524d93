//! Wallet Exposure Probe Library
//!
//! Discovers wallet providers in a browsing context, silently reads the
//! accounts they already expose, and correlates what an embedded third-party
//! frame sees with what the top-level page sees.

pub mod channel;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod exposure;
pub mod probe;
pub mod provider;
pub mod tracker;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
