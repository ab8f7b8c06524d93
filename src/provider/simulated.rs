//! Scripted wallet providers
//!
//! Stand-ins for browser wallet extensions. A [`SimulatedWallet`] installs a
//! [`SimulatedProvider`] into a [`Window`], answering discovery requests and
//! optionally injecting itself as the legacy global.
//!
//! Permission scoping is what makes the leak visible: a wallet that keys
//! permissions by the top-level origin answers `eth_accounts` inside any frame
//! of an authorized page.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    announce_event, request_event, Provider, ProviderDetail, ProviderError, ProviderInfo,
    RpcRequest, ETH_ACCOUNTS, ETH_REQUEST_ACCOUNTS,
};
use crate::context::{ContextEvent, ExecutionContext, Window};

/// How a provider answers `eth_accounts`
#[derive(Debug, Clone, PartialEq)]
pub enum AccountsBehavior {
    /// Answer immediately
    Respond,
    /// Answer after a delay
    Delay(Duration),
    /// Reject with an error
    Reject(ProviderError),
    /// Never settle
    Hang,
}

/// Which origin a wallet evaluates permissions against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// The top-level page origin (leaks into embedded frames)
    TopLevel,
    /// The origin of the requesting frame
    PerFrame,
}

/// Scripted provider capability
pub struct SimulatedProvider {
    accounts: Vec<String>,
    /// `None` means authorized everywhere
    authorized_origins: Option<HashSet<String>>,
    permission_origin: String,
    behavior: AccountsBehavior,
    flags: HashSet<String>,
    sub_providers: Vec<Arc<dyn Provider>>,
    calls: Mutex<Vec<String>>,
}

impl SimulatedProvider {
    /// Provider that discloses `accounts` to every caller
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
            authorized_origins: None,
            permission_origin: String::new(),
            behavior: AccountsBehavior::Respond,
            flags: HashSet::new(),
            sub_providers: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider that rejects every account query
    pub fn rejecting(error: ProviderError) -> Self {
        Self::new(Vec::<String>::new()).with_behavior(AccountsBehavior::Reject(error))
    }

    /// Provider whose account query never settles
    pub fn hanging() -> Self {
        Self::new(Vec::<String>::new()).with_behavior(AccountsBehavior::Hang)
    }

    pub fn with_behavior(mut self, behavior: AccountsBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn with_sub_providers(mut self, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.sub_providers = providers;
        self
    }

    /// Only disclose accounts when `permission_origin` is one of `origins`
    pub fn with_authorization<I, S>(mut self, permission_origin: &str, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission_origin = permission_origin.to_string();
        self.authorized_origins = Some(origins.into_iter().map(Into::into).collect());
        self
    }

    /// Methods requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn is_authorized(&self) -> bool {
        match &self.authorized_origins {
            Some(origins) => origins.contains(&self.permission_origin),
            None => true,
        }
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.method.clone());

        match request.method.as_str() {
            ETH_ACCOUNTS => {
                match &self.behavior {
                    AccountsBehavior::Respond => {}
                    AccountsBehavior::Delay(delay) => tokio::time::sleep(*delay).await,
                    AccountsBehavior::Reject(error) => return Err(error.clone()),
                    AccountsBehavior::Hang => std::future::pending::<()>().await,
                }
                if self.is_authorized() {
                    Ok(json!(self.accounts))
                } else {
                    Ok(json!([]))
                }
            }
            // Nobody is there to approve a prompt
            ETH_REQUEST_ACCOUNTS => Err(ProviderError::user_rejected()),
            "eth_chainId" => Ok(json!("0x1")),
            other => Err(ProviderError::unsupported_method(other)),
        }
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    fn sub_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.sub_providers.clone()
    }
}

/// A wallet extension to install into a context
#[derive(Debug, Clone)]
pub struct SimulatedWallet {
    pub info: ProviderInfo,
    pub accounts: Vec<String>,
    /// Origins the user connected this wallet to
    pub authorized_origins: Vec<String>,
    pub permission_scope: PermissionScope,
    /// Answers `<ns>:requestProvider`
    pub announces: bool,
    /// Delay before answering a discovery request
    pub announce_delay: Duration,
    /// Installs itself as the legacy injected global
    pub injects_global: bool,
    pub flags: Vec<String>,
    pub behavior: AccountsBehavior,
}

impl SimulatedWallet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ProviderInfo::named(name),
            accounts: Vec::new(),
            authorized_origins: Vec::new(),
            permission_scope: PermissionScope::TopLevel,
            announces: true,
            announce_delay: Duration::ZERO,
            injects_global: false,
            flags: Vec::new(),
            behavior: AccountsBehavior::Respond,
        }
    }

    /// Install the wallet into `window`, returning the provider it exposes there.
    ///
    /// Must be called from within a Tokio runtime when the wallet announces.
    pub fn install(&self, window: &Arc<Window>, namespace: &str) -> Arc<SimulatedProvider> {
        let permission_origin = match self.permission_scope {
            PermissionScope::TopLevel => window.top_origin().to_string(),
            PermissionScope::PerFrame => window.origin().to_string(),
        };

        let mut provider = SimulatedProvider::new(self.accounts.clone())
            .with_behavior(self.behavior.clone())
            .with_authorization(&permission_origin, self.authorized_origins.clone());
        for flag in &self.flags {
            provider = provider.with_flag(flag.clone());
        }
        let provider = Arc::new(provider);

        if self.announces {
            let mut info = self.info.clone();
            if info.uuid.is_none() {
                info.uuid = Some(uuid::Uuid::new_v4().to_string());
            }
            spawn_announcer(
                window,
                namespace,
                ProviderDetail {
                    provider: provider.clone(),
                    info,
                },
                self.announce_delay,
            );
        }

        if self.injects_global {
            window.set_injected_provider(provider.clone());
        }

        debug!(
            wallet = ?self.info.name,
            origin = %window.origin(),
            permission_origin = %permission_origin,
            "Simulated wallet installed"
        );

        provider
    }
}

/// Answer every `<ns>:requestProvider` on `window` with an announcement
pub fn spawn_announcer(
    window: &Arc<Window>,
    namespace: &str,
    detail: ProviderDetail,
    delay: Duration,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    window.add_event_listener(&request_event(namespace), tx);

    // Weak so the listener does not keep its own window alive
    let window = Arc::downgrade(window);
    let announce_name = announce_event(namespace);

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(window) = window.upgrade() else {
                break;
            };
            window.dispatch_event(ContextEvent::announce(announce_name.clone(), detail.clone()));
        }
    });
}
