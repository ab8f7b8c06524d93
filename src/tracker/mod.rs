//! Periodic probing
//!
//! A tracker runs one probe as soon as it starts (`<prefix>-on-load`) and
//! then one every interval (`<prefix>-auto`). Each run optionally posts its
//! report to a target context and hands it to a local sink.
//!
//! The loop is tied to a [`TrackerHandle`]: stopping or dropping the handle
//! ends it, including a run in flight.

pub mod scheduler;
pub mod supervisor;

use async_trait::async_trait;

use crate::probe::ProbeReport;

pub use scheduler::{TargetContext, TrackerHandle, TrackerOptions, TrackerScheduler};
pub use supervisor::Supervisor;

/// Local consumer of every report a tracker produces
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn on_report(&self, report: &ProbeReport);
}
