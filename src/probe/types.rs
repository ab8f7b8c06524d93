//! Probe result types
//!
//! Field names on the wire match what the tracker frame posts to its parent:
//! `{ context, origin, results: [{ wallet, accounts, error }] }`.

use serde::{Deserialize, Serialize};

/// Wallet name of the synthetic "nothing found" result
pub const NO_PROVIDERS_WALLET: &str = "(none)";

/// Error text of the synthetic "nothing found" result
pub const NO_PROVIDERS_ERROR: &str = "No wallet providers detected";

/// Outcome of probing one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(rename = "wallet", default)]
    pub wallet_name: String,
    /// Disclosed accounts; `None` when the query failed
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(wallet_name: impl Into<String>, accounts: Vec<String>) -> Self {
        Self {
            wallet_name: wallet_name.into(),
            accounts: Some(accounts),
            error: None,
        }
    }

    pub fn failure(wallet_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            wallet_name: wallet_name.into(),
            accounts: None,
            error: Some(error.into()),
        }
    }

    /// Stand-in result when discovery found nothing
    pub fn no_providers() -> Self {
        Self {
            wallet_name: NO_PROVIDERS_WALLET.to_string(),
            accounts: Some(Vec::new()),
            error: Some(NO_PROVIDERS_ERROR.to_string()),
        }
    }

    /// Whether this is the synthetic "nothing found" result.
    ///
    /// A real wallet announcing itself as `(none)` still reads accounts or
    /// fails with its own error, so all three fields are checked.
    pub fn is_no_providers(&self) -> bool {
        self.wallet_name == NO_PROVIDERS_WALLET
            && self.error.as_deref() == Some(NO_PROVIDERS_ERROR)
            && self.accounts.as_ref().is_some_and(|a| a.is_empty())
    }

    /// Failed without reading any accounts
    pub fn is_error(&self) -> bool {
        self.error.is_some() && self.accounts.is_none()
    }

    /// Accounts read, or an empty slice
    pub fn account_list(&self) -> &[String] {
        self.accounts.as_deref().unwrap_or(&[])
    }
}

/// Everything one orchestration run saw in one context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Run label (`<prefix>-on-load`, `<prefix>-auto`, `manual`)
    #[serde(default)]
    pub context: String,
    /// Origin of the context that ran the probe
    #[serde(default)]
    pub origin: String,
    /// Results in discovery order
    #[serde(default)]
    pub results: Vec<ProbeResult>,
}

impl ProbeReport {
    /// Real wallets (excludes the synthetic "nothing found" entry)
    pub fn wallets(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.is_no_providers())
    }

    /// Whether any provider was found
    pub fn has_wallets(&self) -> bool {
        self.wallets().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let report = ProbeReport {
            context: "tracker-on-load".to_string(),
            origin: "https://tracker.example".to_string(),
            results: vec![
                ProbeResult::success("MetaMask", vec!["0xabc".to_string()]),
                ProbeResult::failure("Broken", "boom"),
            ],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "context": "tracker-on-load",
                "origin": "https://tracker.example",
                "results": [
                    { "wallet": "MetaMask", "accounts": ["0xabc"], "error": null },
                    { "wallet": "Broken", "accounts": null, "error": "boom" }
                ]
            })
        );
    }

    #[test]
    fn test_lenient_decode() {
        let report: ProbeReport =
            serde_json::from_value(json!({ "results": [{ "wallet": "A" }] })).unwrap();
        assert_eq!(report.context, "");
        assert_eq!(report.results[0].accounts, None);
        assert!(!report.results[0].is_error());
    }

    #[test]
    fn test_no_providers_is_not_a_wallet() {
        let report = ProbeReport {
            context: "manual".to_string(),
            origin: "https://top.example".to_string(),
            results: vec![ProbeResult::no_providers()],
        };
        assert!(!report.has_wallets());
        assert!(!report.results[0].is_error());
    }

    #[test]
    fn test_wallet_named_none_is_a_wallet() {
        let report = ProbeReport {
            context: "manual".to_string(),
            origin: "https://top.example".to_string(),
            results: vec![
                ProbeResult::success(NO_PROVIDERS_WALLET, vec!["0xabc".to_string()]),
                ProbeResult::failure(NO_PROVIDERS_WALLET, "locked"),
            ],
        };
        assert!(!report.results[0].is_no_providers());
        assert!(!report.results[1].is_no_providers());
        assert_eq!(report.wallets().count(), 2);
    }
}
