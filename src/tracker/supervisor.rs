//! Supervising page
//!
//! The top-level page probes its own wallets on a timer, listens for reports
//! from the embedded tracker frame, and correlates both in one monitor.

use std::sync::Arc;
use tracing::info;

use super::scheduler::{TargetContext, TrackerHandle, TrackerOptions, TrackerScheduler};
use crate::channel::{OriginPolicy, ReportReceiver};
use crate::exposure::{ExposureMonitor, ExposureSummary, SummaryRenderer};
use crate::probe::ProbeOrchestrator;

/// Label of a user-triggered re-probe
pub const MANUAL_LABEL: &str = "manual";

pub struct Supervisor {
    orchestrator: Arc<ProbeOrchestrator>,
    monitor: Arc<ExposureMonitor>,
    receiver: ReportReceiver,
    tracker: TrackerHandle,
}

impl Supervisor {
    /// Start listening and probing.
    ///
    /// `options.target` and `options.sink` are replaced: the page's own
    /// reports go to the monitor and are never posted anywhere.
    pub fn start(
        orchestrator: Arc<ProbeOrchestrator>,
        options: TrackerOptions,
        policy: OriginPolicy,
        renderer: Option<Arc<dyn SummaryRenderer>>,
    ) -> Self {
        let monitor = Arc::new(ExposureMonitor::new(renderer));
        let context = orchestrator.context().clone();

        let receiver = ReportReceiver::spawn(
            context.clone(),
            options.message_type.clone(),
            policy,
            monitor.clone(),
        );

        let tracker = TrackerScheduler::new(orchestrator.clone()).start(TrackerOptions {
            target: TargetContext::None,
            sink: Some(monitor.clone()),
            ..options
        });

        info!(origin = %context.origin(), "Supervisor started");

        Self {
            orchestrator,
            monitor,
            receiver,
            tracker,
        }
    }

    /// Probe the page right now
    pub async fn rerun_manual(&self) -> ExposureSummary {
        let report = self.orchestrator.run(MANUAL_LABEL).await;
        self.monitor.ingest_supervisor_report(report).await
    }

    pub fn monitor(&self) -> &Arc<ExposureMonitor> {
        &self.monitor
    }

    pub fn tracker(&self) -> &TrackerHandle {
        &self.tracker
    }

    pub fn receiver(&self) -> &ReportReceiver {
        &self.receiver
    }

    /// Stop the timer and the listener
    pub async fn shutdown(self) {
        self.tracker.shutdown().await;
        self.receiver.shutdown().await;
        info!("Supervisor stopped");
    }
}
