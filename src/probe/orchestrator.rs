//! One discovery + probe pass over a context

use std::sync::Arc;
use tracing::info;

use super::account::{AccountProbe, ProbeOutcome};
use super::types::{ProbeReport, ProbeResult};
use crate::context::ExecutionContext;
use crate::provider::{DiscoveryConfig, ProviderRegistry};

/// Runs discovery and probes every provider found, one after another
pub struct ProbeOrchestrator {
    context: Arc<dyn ExecutionContext>,
    registry: ProviderRegistry,
    probe: AccountProbe,
}

impl ProbeOrchestrator {
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        discovery: DiscoveryConfig,
        probe: AccountProbe,
    ) -> Self {
        Self {
            registry: ProviderRegistry::new(context.clone(), discovery),
            context,
            probe,
        }
    }

    /// Context this orchestrator probes
    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Produce one report labelled `context_label`.
    ///
    /// Probes are sequential, so results keep discovery order.
    pub async fn run(&self, context_label: &str) -> ProbeReport {
        let handles = self.registry.discover().await;
        let mut results = Vec::with_capacity(handles.len().max(1));

        if handles.is_empty() {
            results.push(ProbeResult::no_providers());
        } else {
            for handle in &handles {
                match self.probe.probe(handle).await {
                    ProbeOutcome::Completed(result) => results.push(result),
                    ProbeOutcome::TimedOut => {}
                }
            }
        }

        let report = ProbeReport {
            context: context_label.to_string(),
            origin: self.context.origin().to_string(),
            results,
        };

        info!(
            context = %report.context,
            origin = %report.origin,
            providers = handles.len(),
            results = report.results.len(),
            "Probe run complete"
        );
        report
    }
}
