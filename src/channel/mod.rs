//! Cross-context report transport
//!
//! The tracker frame posts `{ type, payload }` to its parent with target
//! origin `*`: delivery does not require knowing who embeds the frame.
//!
//! The receiving side does not authenticate the sender by itself. Any context
//! that can reach the listener can inject a report of the right type. Whether
//! that is tolerated is an [`OriginPolicy`] decision.

pub mod policy;
pub mod receiver;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::{ExecutionContext, WILDCARD_ORIGIN};
use crate::error::{Error, Result};
use crate::probe::{ProbeReport, ProbeResult};

pub use policy::OriginPolicy;
pub use receiver::{ReceiverStats, ReportReceiver};

/// Envelope type the tracker frame uses
pub const DEFAULT_MESSAGE_TYPE: &str = "walletExposureFromIframe";

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: ProbeReport,
}

/// Sending half, bound to the context the reports originate from
pub struct CrossContextChannel {
    source: Arc<dyn ExecutionContext>,
}

impl CrossContextChannel {
    pub fn new(source: Arc<dyn ExecutionContext>) -> Self {
        Self { source }
    }

    /// Best-effort post; failures are logged and dropped
    pub fn send(&self, report: &ProbeReport, target: &dyn ExecutionContext, message_type: &str) {
        if let Err(e) = self.try_send(report, target, message_type) {
            warn!(
                target_origin = %target.origin(),
                context = %report.context,
                "Report post failed: {}",
                e
            );
        }
    }

    /// Post and surface the failure
    pub fn try_send(
        &self,
        report: &ProbeReport,
        target: &dyn ExecutionContext,
        message_type: &str,
    ) -> Result<()> {
        let envelope = MessageEnvelope {
            message_type: message_type.to_string(),
            payload: report.clone(),
        };
        let data = serde_json::to_value(&envelope)?;

        target
            .post_message(data, WILDCARD_ORIGIN, self.source.origin())
            .map_err(|e| match e {
                Error::ContextClosed(_) => e,
                other => Error::Transport(other.to_string()),
            })?;

        debug!(
            target_origin = %target.origin(),
            context = %report.context,
            results = report.results.len(),
            "Report posted"
        );
        Ok(())
    }
}

/// Extract a report from message data.
///
/// `Ok(None)` for messages of another type. The payload is read field by
/// field: missing or null `context`/`origin`/`results` become empty values and
/// result entries that are not a usable result object are skipped one by one.
/// Only a payload or `results` of the wrong JSON kind rejects the envelope.
pub fn decode_envelope(data: &Value, message_type: &str) -> Result<Option<ProbeReport>> {
    let Some(kind) = data.get("type").and_then(Value::as_str) else {
        return Ok(None);
    };
    if kind != message_type {
        return Ok(None);
    }

    let payload = match data.get("payload") {
        None | Some(Value::Null) => return Ok(Some(ProbeReport::default())),
        Some(Value::Object(payload)) => payload,
        Some(other) => {
            return Err(Error::MalformedEnvelope(format!(
                "payload is not an object: {}",
                other
            )))
        }
    };

    let text = |field: &str| {
        payload
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let items = match payload.get("results") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(Error::MalformedEnvelope(format!(
                "results is not an array: {}",
                other
            )))
        }
    };

    let total = items.len();
    let results: Vec<ProbeResult> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ProbeResult>(item).ok())
        .filter(|result| !result.wallet_name.is_empty())
        .collect();

    if results.len() < total {
        debug!(
            skipped = total - results.len(),
            kept = results.len(),
            "Skipped unusable result entries"
        );
    }

    Ok(Some(ProbeReport {
        context: text("context"),
        origin: text("origin"),
        results,
    }))
}
