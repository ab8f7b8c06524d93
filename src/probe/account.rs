//! Single-provider account probe
//!
//! Issues `eth_accounts` (never `eth_requestAccounts`), so the read is silent:
//! it only returns what the wallet already decided to disclose to the caller.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::provider::{ProviderHandle, RpcRequest};

use super::types::ProbeResult;

/// Error text used when a provider returns something that is not a list
pub const UNEXPECTED_RESPONSE: &str = "unexpected eth_accounts response";

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Completed(ProbeResult),
    /// The deadline expired; reported like an absent provider
    TimedOut,
}

impl ProbeOutcome {
    pub fn into_result(self) -> Option<ProbeResult> {
        match self {
            ProbeOutcome::Completed(result) => Some(result),
            ProbeOutcome::TimedOut => None,
        }
    }
}

/// Reads already-authorized accounts from one provider
#[derive(Debug, Clone)]
pub struct AccountProbe {
    deadline: Option<Duration>,
}

impl Default for AccountProbe {
    fn default() -> Self {
        Self::new(Some(Duration::from_millis(1500)))
    }
}

impl AccountProbe {
    /// `None` disables the deadline
    pub fn new(deadline: Option<Duration>) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Probe one provider. Never fails; provider errors become data.
    pub async fn probe(&self, handle: &ProviderHandle) -> ProbeOutcome {
        let request = handle.provider.request(RpcRequest::eth_accounts());

        let response = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, request).await {
                Ok(response) => response,
                Err(_) => {
                    debug!(
                        wallet = %handle.display_name,
                        deadline_ms = deadline.as_millis() as u64,
                        "eth_accounts timed out, dropping"
                    );
                    return ProbeOutcome::TimedOut;
                }
            },
            None => request.await,
        };

        let result = match response {
            Ok(value) => match parse_accounts(value) {
                Some(accounts) => ProbeResult::success(&handle.display_name, accounts),
                None => ProbeResult::failure(&handle.display_name, UNEXPECTED_RESPONSE),
            },
            Err(e) => {
                let message = e.message().map(str::to_string).unwrap_or_else(|| e.to_string());
                ProbeResult::failure(&handle.display_name, message)
            }
        };

        debug!(
            wallet = %handle.display_name,
            accounts = result.account_list().len(),
            error = ?result.error,
            "Probed provider"
        );
        ProbeOutcome::Completed(result)
    }
}

/// `null` means nothing authorized; non-string entries are skipped.
///
/// Strings are kept as returned, empty ones included. Blank addresses are
/// only left out of the visible-address union.
fn parse_accounts(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(address) => Some(address),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        AccountsBehavior, Provider, ProviderError, ProviderSource, SimulatedProvider,
        ETH_ACCOUNTS,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    fn handle(name: &str, provider: Arc<dyn Provider>) -> ProviderHandle {
        ProviderHandle {
            provider,
            display_name: name.to_string(),
            source: ProviderSource::Injected,
        }
    }

    struct FixedResponse(Value);

    #[async_trait]
    impl Provider for FixedResponse {
        async fn request(&self, _request: RpcRequest) -> Result<Value, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_reads_accounts_without_prompting() {
        let provider = Arc::new(SimulatedProvider::new(["0xabc", "0xdef"]));
        let outcome = AccountProbe::default()
            .probe(&handle("MetaMask", provider.clone()))
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Completed(ProbeResult::success(
                "MetaMask",
                vec!["0xabc".to_string(), "0xdef".to_string()]
            ))
        );
        assert_eq!(provider.calls(), vec![ETH_ACCOUNTS.to_string()]);
    }

    #[tokio::test]
    async fn test_rejection_message_captured() {
        let provider = Arc::new(SimulatedProvider::rejecting(ProviderError::unauthorized()));
        let outcome = AccountProbe::default().probe(&handle("Locked", provider)).await;

        let result = outcome.into_result().unwrap();
        assert!(result.is_error());
        assert_eq!(
            result.error.as_deref(),
            ProviderError::unauthorized().message()
        );
    }

    #[tokio::test]
    async fn test_error_without_message_uses_display() {
        let provider = Arc::new(SimulatedProvider::rejecting(ProviderError::Disconnected));
        let result = AccountProbe::default()
            .probe(&handle("Gone", provider))
            .await
            .into_result()
            .unwrap();

        assert_eq!(result.error.as_deref(), Some("Provider disconnected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_times_out() {
        let provider = Arc::new(SimulatedProvider::hanging());
        let outcome = AccountProbe::new(Some(Duration::from_millis(1500)))
            .probe(&handle("Hung", provider))
            .await;

        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_within_deadline() {
        let provider = Arc::new(
            SimulatedProvider::new(["0xabc"])
                .with_behavior(AccountsBehavior::Delay(Duration::from_millis(1000))),
        );
        let outcome = AccountProbe::new(Some(Duration::from_millis(1500)))
            .probe(&handle("Slow", provider))
            .await;

        assert!(matches!(outcome, ProbeOutcome::Completed(ref r) if r.account_list() == ["0xabc"]));
    }

    #[tokio::test]
    async fn test_null_and_malformed_responses() {
        let null = AccountProbe::default()
            .probe(&handle("Null", Arc::new(FixedResponse(Value::Null))))
            .await
            .into_result()
            .unwrap();
        assert_eq!(null.accounts, Some(vec![]));

        let object = AccountProbe::default()
            .probe(&handle("Odd", Arc::new(FixedResponse(json!({"a": 1})))))
            .await
            .into_result()
            .unwrap();
        assert_eq!(object.error.as_deref(), Some(UNEXPECTED_RESPONSE));

        let mixed = AccountProbe::default()
            .probe(&handle("Mixed", Arc::new(FixedResponse(json!(["0x1", 7, "", "0x2"])))))
            .await
            .into_result()
            .unwrap();
        assert_eq!(
            mixed.accounts,
            Some(vec!["0x1".to_string(), String::new(), "0x2".to_string()])
        );
    }
}
