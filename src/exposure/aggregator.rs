//! Per-wallet exposure state
//!
//! Entries are keyed by wallet name: provider references never cross a
//! context boundary, the name is the only thing both sides can observe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::probe::ProbeReport;

/// Correlation state for one wallet name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposureEntry {
    pub wallet_name: String,
    /// Visible when probed in the supervising context
    pub seen_in_supervisor: bool,
    /// Visible when probed inside the subordinate context
    pub seen_in_subordinate: bool,
    /// Accounts read by the subordinate context (last report wins)
    pub leaked_accounts: Vec<String>,
}

impl ExposureEntry {
    fn new(wallet_name: &str) -> Self {
        Self {
            wallet_name: wallet_name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_exposed(&self) -> bool {
        self.seen_in_subordinate && !self.leaked_accounts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Exposed,
    NotExposed,
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureState {
    /// No wallet seen in any context
    NoProvidersDetected,
    /// Every subordinate probe failed; nothing can be said about leaking
    Inconclusive,
    NotExposed,
    Exposed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletExposure {
    #[serde(flatten)]
    pub entry: ExposureEntry,
    pub classification: Classification,
}

/// Displayable snapshot handed to the rendering collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureSummary {
    pub state: ExposureState,
    /// Wallets in first-seen order
    pub wallets: Vec<WalletExposure>,
    /// Addresses visible on this page from either context
    pub visible_addresses: Vec<String>,
    /// Whether the supervising context's own last probe found a wallet
    pub supervisor_has_wallets: bool,
    pub generated_at: DateTime<Utc>,
}

impl ExposureSummary {
    /// Wallets that leaked accounts
    pub fn exposed(&self) -> impl Iterator<Item = &WalletExposure> {
        self.wallets
            .iter()
            .filter(|w| w.classification == Classification::Exposed)
    }
}

/// Merges reports from the supervising and subordinate contexts
#[derive(Debug, Default)]
pub struct ExposureAggregator {
    entries: Vec<ExposureEntry>,
    index: HashMap<String, usize>,
    last_supervisor: Option<ProbeReport>,
    last_subordinate: Option<ProbeReport>,
}

impl ExposureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report produced by probing the supervising context directly
    pub fn ingest_supervisor_report(&mut self, report: ProbeReport) {
        for result in report.wallets() {
            if result.wallet_name.is_empty() {
                continue;
            }
            self.entry_mut(&result.wallet_name).seen_in_supervisor = true;
        }
        debug!(context = %report.context, "Ingested supervisor report");
        self.last_supervisor = Some(report);
    }

    /// Record a report that arrived from the subordinate context
    pub fn ingest_subordinate_report(&mut self, report: ProbeReport) {
        for result in report.wallets() {
            if result.wallet_name.is_empty() {
                continue;
            }
            let entry = self.entry_mut(&result.wallet_name);
            entry.seen_in_subordinate = true;
            if let Some(accounts) = &result.accounts {
                entry.leaked_accounts = accounts.clone();
            }
        }
        debug!(
            context = %report.context,
            origin = %report.origin,
            "Ingested subordinate report"
        );
        self.last_subordinate = Some(report);
    }

    fn entry_mut(&mut self, wallet_name: &str) -> &mut ExposureEntry {
        let idx = match self.index.get(wallet_name).copied() {
            Some(idx) => idx,
            None => {
                self.entries.push(ExposureEntry::new(wallet_name));
                self.index
                    .insert(wallet_name.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    pub fn entries(&self) -> &[ExposureEntry] {
        &self.entries
    }

    pub fn entry(&self, wallet_name: &str) -> Option<&ExposureEntry> {
        self.index.get(wallet_name).map(|idx| &self.entries[*idx])
    }

    pub fn last_supervisor_report(&self) -> Option<&ProbeReport> {
        self.last_supervisor.as_ref()
    }

    pub fn last_subordinate_report(&self) -> Option<&ProbeReport> {
        self.last_subordinate.as_ref()
    }

    /// Deduplicated addresses from both last reports, supervisor first
    pub fn visible_addresses(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        let reports = [self.last_supervisor.as_ref(), self.last_subordinate.as_ref()];
        for report in reports.into_iter().flatten() {
            for result in &report.results {
                for address in result.account_list() {
                    if !address.is_empty() && seen.insert(address.as_str()) {
                        out.push(address.clone());
                    }
                }
            }
        }
        out
    }

    /// Every subordinate probe failed without reading accounts
    fn subordinate_inconclusive(&self) -> bool {
        match &self.last_subordinate {
            Some(report) => {
                !report.results.is_empty() && report.results.iter().all(|r| r.is_error())
            }
            None => false,
        }
    }

    pub fn state(&self) -> ExposureState {
        if self.entries.is_empty() {
            ExposureState::NoProvidersDetected
        } else if self.subordinate_inconclusive() {
            ExposureState::Inconclusive
        } else if self.entries.iter().any(ExposureEntry::is_exposed) {
            ExposureState::Exposed
        } else {
            ExposureState::NotExposed
        }
    }

    pub fn summary(&self) -> ExposureSummary {
        let wallets = self
            .entries
            .iter()
            .map(|entry| WalletExposure {
                classification: if entry.is_exposed() {
                    Classification::Exposed
                } else {
                    Classification::NotExposed
                },
                entry: entry.clone(),
            })
            .collect();

        ExposureSummary {
            state: self.state(),
            wallets,
            visible_addresses: self.visible_addresses(),
            supervisor_has_wallets: self
                .last_supervisor
                .as_ref()
                .is_some_and(ProbeReport::has_wallets),
            generated_at: Utc::now(),
        }
    }
}
