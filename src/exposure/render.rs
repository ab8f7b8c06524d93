//! Rendering collaborators
//!
//! Presentation is outside the core; these traits are the hand-off points.
//! [`LogRenderer`] writes everything to the tracing log, which is all the CLI
//! needs.

use async_trait::async_trait;
use tracing::{info, warn};

use super::aggregator::{ExposureState, ExposureSummary};
use crate::probe::ProbeReport;
use crate::tracker::ReportSink;

/// Receives a fresh summary after every ingest
pub trait SummaryRenderer: Send + Sync {
    fn render(&self, summary: &ExposureSummary);
}

/// Logs summaries and reports
#[derive(Debug, Clone, Default)]
pub struct LogRenderer;

impl SummaryRenderer for LogRenderer {
    fn render(&self, summary: &ExposureSummary) {
        let wallets: Vec<String> = summary
            .wallets
            .iter()
            .map(|w| {
                format!(
                    "{}[{}]",
                    w.entry.wallet_name,
                    if w.entry.seen_in_subordinate { "frame" } else { "page" }
                )
            })
            .collect();

        match summary.state {
            ExposureState::NoProvidersDetected => {
                info!("Wallet providers on this page: none detected");
            }
            ExposureState::Inconclusive => {
                info!(
                    wallets = %wallets.join(", "),
                    "Leak check inconclusive: every provider call in the frame failed"
                );
            }
            ExposureState::NotExposed => {
                info!(
                    wallets = %wallets.join(", "),
                    "No wallet addresses were learned indirectly"
                );
            }
            ExposureState::Exposed => {
                for wallet in summary.exposed() {
                    warn!(
                        wallet = %wallet.entry.wallet_name,
                        accounts = %wallet.entry.leaked_accounts.join(", "),
                        "Wallet exposed addresses to the embedded frame"
                    );
                }
            }
        }

        if !summary.supervisor_has_wallets {
            info!("No wallet visible to the page itself");
        }
        info!(
            addresses = %summary.visible_addresses.join(", "),
            count = summary.visible_addresses.len(),
            "Addresses visible on this page"
        );
    }
}

#[async_trait]
impl ReportSink for LogRenderer {
    async fn on_report(&self, report: &ProbeReport) {
        info!(context = %report.context, origin = %report.origin, "Local probe report");
        for result in &report.results {
            match &result.error {
                Some(error) => info!(wallet = %result.wallet_name, error = %error, "error"),
                None if result.account_list().is_empty() => {
                    info!(wallet = %result.wallet_name, "no address visible")
                }
                None => info!(
                    wallet = %result.wallet_name,
                    accounts = ?result.account_list(),
                    "{} address(es)",
                    result.account_list().len()
                ),
            }
        }
    }
}
