//! Wallet provider model
//!
//! A provider is the capability object a wallet extension exposes to a page.
//! The core only ever issues read-only `eth_accounts` requests through it.
//!
//! # Discovery
//!
//! ```text
//! page:   dispatch "<ns>:requestProvider"
//! wallet: dispatch "<ns>:announceProvider" { provider, info }
//! page:   (after the window closes) fall back to the injected global provider
//! ```

pub mod registry;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use registry::{DedupKey, DiscoveryConfig, ProviderHandle, ProviderRegistry, ProviderSource};
pub use simulated::{AccountsBehavior, PermissionScope, SimulatedProvider, SimulatedWallet};

/// Default discovery event namespace (EIP-6963)
pub const DEFAULT_NAMESPACE: &str = "eip6963";

/// Read already-authorized accounts (never prompts)
pub const ETH_ACCOUNTS: &str = "eth_accounts";

/// Connect request (prompts the user); never issued by the probe
pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";

/// Name of the event a page broadcasts to ask providers to announce themselves
pub fn request_event(namespace: &str) -> String {
    format!("{}:requestProvider", namespace)
}

/// Name of the event a provider dispatches to announce itself
pub fn announce_event(namespace: &str) -> String {
    format!("{}:announceProvider", namespace)
}

/// JSON-RPC style request accepted by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Request for the accounts the provider has already disclosed
    pub fn eth_accounts() -> Self {
        Self {
            method: ETH_ACCOUNTS.to_string(),
            params: Vec::new(),
        }
    }
}

/// Failure returned by a provider request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// EIP-1193 style error with numeric code
    #[error("Provider RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Provider disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// EIP-1193 4001
    pub fn user_rejected() -> Self {
        ProviderError::Rpc {
            code: 4001,
            message: "User rejected the request.".to_string(),
        }
    }

    /// EIP-1193 4100
    pub fn unauthorized() -> Self {
        ProviderError::Rpc {
            code: 4100,
            message: "The requested method and/or account has not been authorized by the user."
                .to_string(),
        }
    }

    /// EIP-1193 4200
    pub fn unsupported_method(method: &str) -> Self {
        ProviderError::Rpc {
            code: 4200,
            message: format!("The provider does not support the requested method: {}", method),
        }
    }

    /// The message text carried by the error, if it has one
    pub fn message(&self) -> Option<&str> {
        match self {
            ProviderError::Rpc { message, .. } if !message.is_empty() => Some(message),
            ProviderError::Other(message) if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// An injected wallet provider capability
///
/// Capability flags (`isMetaMask`, `isCoinbaseWallet`, ...) and sub-providers
/// only matter for the legacy injected-global fallback.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Issue a request-style call
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError>;

    /// Whether a capability flag such as `isMetaMask` is set
    fn has_flag(&self, _flag: &str) -> bool {
        false
    }

    /// Providers multiplexed behind this one (`ethereum.providers`)
    fn sub_providers(&self) -> Vec<Arc<dyn Provider>> {
        Vec::new()
    }
}

/// Identity of a provider reference, used for reference-based dedup
pub fn provider_identity(provider: &Arc<dyn Provider>) -> usize {
    Arc::as_ptr(provider) as *const () as usize
}

/// Metadata a provider announces about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdns: Option<String>,
}

impl ProviderInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Detail carried by an announcement event
#[derive(Clone)]
pub struct ProviderDetail {
    pub provider: Arc<dyn Provider>,
    pub info: ProviderInfo,
}

impl fmt::Debug for ProviderDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDetail")
            .field("provider", &format_args!("{:#x}", provider_identity(&self.provider)))
            .field("info", &self.info)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(request_event("eip6963"), "eip6963:requestProvider");
        assert_eq!(announce_event("eip6963"), "eip6963:announceProvider");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            ProviderError::user_rejected().message(),
            Some("User rejected the request.")
        );
        assert_eq!(ProviderError::Disconnected.message(), None);

        let bare = ProviderError::Rpc {
            code: -32603,
            message: String::new(),
        };
        assert_eq!(bare.message(), None);
        assert_eq!(bare.to_string(), "Provider RPC error -32603: ");
    }

    #[test]
    fn test_eth_accounts_request_shape() {
        let json = serde_json::to_value(RpcRequest::eth_accounts()).unwrap();
        assert_eq!(json, serde_json::json!({ "method": "eth_accounts", "params": [] }));
    }
}
