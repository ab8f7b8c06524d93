//! Shared aggregator for the supervising context
//!
//! Two producers write into it: the page's own periodic probe and the message
//! receiver. Each owns its own slot, so interleaving between them is fine.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::aggregator::{ExposureAggregator, ExposureEntry, ExposureSummary};
use super::render::SummaryRenderer;
use crate::probe::ProbeReport;
use crate::tracker::ReportSink;

pub struct ExposureMonitor {
    aggregator: RwLock<ExposureAggregator>,
    renderer: Option<Arc<dyn SummaryRenderer>>,
}

impl Default for ExposureMonitor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ExposureMonitor {
    pub fn new(renderer: Option<Arc<dyn SummaryRenderer>>) -> Self {
        Self {
            aggregator: RwLock::new(ExposureAggregator::new()),
            renderer,
        }
    }

    pub async fn ingest_supervisor_report(&self, report: ProbeReport) -> ExposureSummary {
        let summary = {
            let mut aggregator = self.aggregator.write().await;
            aggregator.ingest_supervisor_report(report);
            aggregator.summary()
        };
        self.render(&summary);
        summary
    }

    pub async fn ingest_subordinate_report(&self, report: ProbeReport) -> ExposureSummary {
        let summary = {
            let mut aggregator = self.aggregator.write().await;
            aggregator.ingest_subordinate_report(report);
            aggregator.summary()
        };
        self.render(&summary);
        summary
    }

    pub async fn summary(&self) -> ExposureSummary {
        self.aggregator.read().await.summary()
    }

    pub async fn entries(&self) -> Vec<ExposureEntry> {
        self.aggregator.read().await.entries().to_vec()
    }

    pub async fn last_supervisor_report(&self) -> Option<ProbeReport> {
        self.aggregator.read().await.last_supervisor_report().cloned()
    }

    pub async fn last_subordinate_report(&self) -> Option<ProbeReport> {
        self.aggregator.read().await.last_subordinate_report().cloned()
    }

    fn render(&self, summary: &ExposureSummary) {
        if let Some(renderer) = &self.renderer {
            renderer.render(summary);
        }
    }
}

/// The page's own probe runs feed the supervisor slot
#[async_trait]
impl ReportSink for ExposureMonitor {
    async fn on_report(&self, report: &ProbeReport) {
        self.ingest_supervisor_report(report.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureState;
    use crate::probe::ProbeResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ExposureState>>);

    impl SummaryRenderer for Recorder {
        fn render(&self, summary: &ExposureSummary) {
            self.0.lock().unwrap().push(summary.state);
        }
    }

    #[tokio::test]
    async fn test_every_ingest_renders() {
        let recorder = Arc::new(Recorder::default());
        let monitor = ExposureMonitor::new(Some(recorder.clone()));

        monitor
            .ingest_supervisor_report(ProbeReport {
                context: "initial".to_string(),
                origin: "https://top.example".to_string(),
                results: vec![ProbeResult::success("MetaMask", vec![])],
            })
            .await;
        monitor
            .ingest_subordinate_report(ProbeReport {
                context: "tracker-on-load".to_string(),
                origin: "https://tracker.example".to_string(),
                results: vec![ProbeResult::success("MetaMask", vec!["0xabc".to_string()])],
            })
            .await;

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![ExposureState::NotExposed, ExposureState::Exposed]
        );
    }

    #[tokio::test]
    async fn test_works_without_renderer() {
        let monitor = ExposureMonitor::default();
        let report = ProbeReport {
            context: "manual".to_string(),
            origin: "https://top.example".to_string(),
            results: vec![ProbeResult::no_providers()],
        };

        monitor.on_report(&report).await;

        assert_eq!(monitor.summary().await.state, ExposureState::NoProvidersDetected);
        assert_eq!(monitor.last_supervisor_report().await, Some(report));
    }
}
