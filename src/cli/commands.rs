//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::Window;
use crate::exposure::{LogRenderer, SummaryRenderer};
use crate::probe::ProbeOrchestrator;
use crate::tracker::{ReportSink, Supervisor, TrackerOptions, TrackerScheduler};

/// A top-level page with one embedded tracker frame, wallets installed in both
struct SimulatedPage {
    top: Arc<Window>,
    frame: Arc<Window>,
}

impl SimulatedPage {
    fn build(config: &Config) -> Self {
        let top = Window::new(config.demo.top_origin.clone());
        let frame = Window::new_frame(&top, config.demo.frame_origin.clone());

        for wallet in &config.demo.wallets {
            let wallet = wallet.to_wallet();
            wallet.install(&top, &config.discovery.namespace);
            wallet.install(&frame, &config.discovery.namespace);
        }

        info!(
            top = %config.demo.top_origin,
            frame = %config.demo.frame_origin,
            wallets = config.demo.wallets.len(),
            "Simulated page ready"
        );

        Self { top, frame }
    }

    fn orchestrator(&self, config: &Config, in_frame: bool) -> Arc<ProbeOrchestrator> {
        let window = if in_frame { &self.frame } else { &self.top };
        Arc::new(ProbeOrchestrator::new(
            window.clone(),
            config.discovery_config(),
            config.account_probe(),
        ))
    }
}

/// Run the supervising page and the frame tracker side by side
pub async fn demo(config: &Config, duration_secs: u64, manual_rerun: bool) -> Result<()> {
    let page = SimulatedPage::build(config);
    let policy = config.origin_policy().context("Invalid trusted origins")?;

    if policy.is_permissive() {
        warn!("Receiver accepts reports from any origin");
    }

    let renderer: Arc<dyn SummaryRenderer> = Arc::new(LogRenderer);
    let sink: Arc<dyn ReportSink> = Arc::new(LogRenderer);

    let supervisor = Supervisor::start(
        page.orchestrator(config, false),
        TrackerOptions {
            context_prefix: config.demo.top_context_prefix.clone(),
            ..config.tracker_options()
        },
        policy,
        Some(renderer),
    );

    let frame_tracker = TrackerScheduler::new(page.orchestrator(config, true)).start(TrackerOptions {
        sink: Some(sink),
        ..config.tracker_options()
    });

    info!("Demo running for {}s (Ctrl+C to stop early)", duration_secs);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    frame_tracker.shutdown().await;

    let summary = if manual_rerun {
        supervisor.rerun_manual().await
    } else {
        supervisor.monitor().summary().await
    };

    info!(
        tracker_runs = supervisor.tracker().runs(),
        accepted = supervisor.receiver().stats().accepted(),
        rejected = supervisor.receiver().stats().rejected_origin(),
        malformed = supervisor.receiver().stats().malformed(),
        "Demo finished"
    );
    supervisor.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Discover and probe once, print the report
pub async fn discover(config: &Config, in_frame: bool, label: &str) -> Result<()> {
    let page = SimulatedPage::build(config);
    let report = page.orchestrator(config, in_frame).run(label).await;

    info!(
        context = %report.context,
        wallets = report.wallets().count(),
        "Discovery finished"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}
