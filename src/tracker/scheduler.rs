//! Tracker loop
//!
//! Runs never overlap: a tick that arrives while a slow run is still going is
//! skipped rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ReportSink;
use crate::channel::{CrossContextChannel, DEFAULT_MESSAGE_TYPE};
use crate::context::ExecutionContext;
use crate::probe::{ProbeOrchestrator, ProbeReport};

/// Where a tracker posts its reports
#[derive(Clone, Default)]
pub enum TargetContext {
    /// The enclosing context when running in a frame, nowhere otherwise
    #[default]
    Parent,
    /// Do not post
    None,
    /// A specific context
    Context(Arc<dyn ExecutionContext>),
}

impl TargetContext {
    fn resolve(&self, context: &Arc<dyn ExecutionContext>) -> Option<Arc<dyn ExecutionContext>> {
        match self {
            TargetContext::Parent => context.parent(),
            TargetContext::None => None,
            TargetContext::Context(target) => Some(target.clone()),
        }
    }
}

/// Tracker settings
#[derive(Clone)]
pub struct TrackerOptions {
    pub target: TargetContext,
    pub message_type: String,
    pub interval: Duration,
    pub context_prefix: String,
    /// Local consumer (rendering, aggregation)
    pub sink: Option<Arc<dyn ReportSink>>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            target: TargetContext::Parent,
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            interval: Duration::from_millis(5000),
            context_prefix: "tracker".to_string(),
            sink: None,
        }
    }
}

/// Probe `context_label` and post the report to `target` if there is one
pub async fn probe_and_post(
    orchestrator: &ProbeOrchestrator,
    context_label: &str,
    target: Option<&dyn ExecutionContext>,
    message_type: &str,
) -> ProbeReport {
    let report = orchestrator.run(context_label).await;

    if let Some(target) = target {
        CrossContextChannel::new(orchestrator.context().clone()).send(
            &report,
            target,
            message_type,
        );
    }

    report
}

/// Everything a single run needs
struct TrackerRun {
    orchestrator: Arc<ProbeOrchestrator>,
    target: Option<Arc<dyn ExecutionContext>>,
    message_type: String,
    sink: Option<Arc<dyn ReportSink>>,
    runs: Arc<AtomicU64>,
}

impl TrackerRun {
    async fn run(&self, label: &str) {
        let report = probe_and_post(
            &self.orchestrator,
            label,
            self.target.as_deref(),
            &self.message_type,
        )
        .await;

        if let Some(sink) = &self.sink {
            sink.on_report(&report).await;
        }

        let count = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(context = %label, run = count, "Tracker run finished");
    }
}

/// Starts tracker loops
pub struct TrackerScheduler {
    orchestrator: Arc<ProbeOrchestrator>,
}

impl TrackerScheduler {
    pub fn new(orchestrator: Arc<ProbeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Run once now, then every `options.interval`, until the handle stops
    pub fn start(&self, options: TrackerOptions) -> TrackerHandle {
        let context = self.orchestrator.context().clone();
        let target = options.target.resolve(&context);
        // tokio intervals cannot be zero
        let period = options.interval.max(Duration::from_millis(1));

        info!(
            origin = %context.origin(),
            target = ?target.as_ref().map(|t| t.origin().to_string()),
            interval_ms = period.as_millis() as u64,
            prefix = %options.context_prefix,
            "Starting tracker"
        );

        let runs = Arc::new(AtomicU64::new(0));
        let job = TrackerRun {
            orchestrator: self.orchestrator.clone(),
            target,
            message_type: options.message_type,
            sink: options.sink,
            runs: runs.clone(),
        };
        let on_load = format!("{}-on-load", options.context_prefix);
        let auto = format!("{}-auto", options.context_prefix);

        let token = CancellationToken::new();
        let cancel = token.clone();

        let task = tokio::spawn(async move {
            let start = Instant::now();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = job.run(&on_load) => {}
            }

            let mut ticker = interval_at(start + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = job.run(&auto) => {}
                }
            }

            info!("Tracker stopped");
        });

        TrackerHandle {
            token,
            task: Some(task),
            runs,
        }
    }
}

/// Owner of a running tracker; dropping it stops the loop
pub struct TrackerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    runs: Arc<AtomicU64>,
}

impl TrackerHandle {
    /// Completed runs so far
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal the loop to stop
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
