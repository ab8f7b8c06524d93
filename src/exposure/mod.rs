//! Exposure correlation
//!
//! The supervising page probes wallets itself and also receives reports from
//! the embedded tracker frame. Correlating the two tells which wallets hand
//! their already-authorized accounts to a context the user never connected.

pub mod aggregator;
pub mod monitor;
pub mod render;

pub use aggregator::{
    Classification, ExposureAggregator, ExposureEntry, ExposureState, ExposureSummary,
    WalletExposure,
};
pub use monitor::ExposureMonitor;
pub use render::{LogRenderer, SummaryRenderer};
