//! Receiving side of the report channel
//!
//! Listens for `message` events on the supervising context, keeps envelopes
//! of the configured type, and hands the payload to the exposure monitor as a
//! subordinate report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decode_envelope;
use super::policy::OriginPolicy;
use crate::context::{EventPayload, ExecutionContext, ListenerGuard, MESSAGE_EVENT};
use crate::exposure::ExposureMonitor;

/// Counters for what the receiver did with incoming messages
#[derive(Debug, Default)]
pub struct ReceiverStats {
    accepted: AtomicU64,
    rejected_origin: AtomicU64,
    malformed: AtomicU64,
}

impl ReceiverStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected_origin(&self) -> u64 {
        self.rejected_origin.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Running message listener; stops on [`ReportReceiver::stop`] or drop
pub struct ReportReceiver {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<ReceiverStats>,
}

impl ReportReceiver {
    /// Start listening on `context`
    pub fn spawn(
        context: Arc<dyn ExecutionContext>,
        message_type: impl Into<String>,
        policy: OriginPolicy,
        monitor: Arc<ExposureMonitor>,
    ) -> Self {
        let message_type = message_type.into();
        let token = CancellationToken::new();
        let stats = Arc::new(ReceiverStats::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = ListenerGuard::install(context.clone(), MESSAGE_EVENT, tx);

        info!(
            origin = %context.origin(),
            message_type = %message_type,
            permissive = policy.is_permissive(),
            "Report receiver listening"
        );

        let cancel = token.clone();
        let task_stats = stats.clone();
        let task = tokio::spawn(async move {
            // Listener lives exactly as long as the loop
            let _guard = guard;

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let EventPayload::Message(message) = event.payload else {
                    continue;
                };

                let report = match decode_envelope(&message.data, &message_type) {
                    Ok(Some(report)) => report,
                    Ok(None) => continue,
                    Err(e) => {
                        task_stats.malformed.fetch_add(1, Ordering::Relaxed);
                        warn!(sender = %message.origin, "Ignoring envelope: {}", e);
                        continue;
                    }
                };

                if !policy.allows(&message.origin) {
                    task_stats.rejected_origin.fetch_add(1, Ordering::Relaxed);
                    warn!(sender = %message.origin, "Report from untrusted origin rejected");
                    continue;
                }

                debug!(
                    sender = %message.origin,
                    context = %report.context,
                    results = report.results.len(),
                    "Subordinate report received"
                );
                task_stats.accepted.fetch_add(1, Ordering::Relaxed);
                monitor.ingest_subordinate_report(report).await;
            }

            debug!("Report receiver stopped");
        });

        Self {
            token,
            task: Some(task),
            stats,
        }
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Signal the listener loop to stop
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

impl Drop for ReportReceiver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
