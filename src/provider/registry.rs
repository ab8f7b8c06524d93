//! Provider discovery
//!
//! Finds the wallet providers present in one execution context without any
//! user interaction. Announced providers (EIP-6963 style) win; the legacy
//! injected global is only consulted when nothing announced within the
//! discovery window.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{
    announce_event, provider_identity, request_event, Provider, ProviderDetail, DEFAULT_NAMESPACE,
};
use crate::context::{ContextEvent, EventPayload, ExecutionContext, ListenerGuard};

/// Capability flags checked, in order, to name an injected provider
const KNOWN_FLAGS: &[(&str, &str)] = &[
    ("isMetaMask", "MetaMask"),
    ("isCoinbaseWallet", "Coinbase"),
    ("isBraveWallet", "Brave Wallet"),
    ("isRabby", "Rabby"),
    ("isTrust", "Trust Wallet"),
    ("isPhantom", "Phantom"),
];

/// What makes two announcements "the same provider"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// The provider reference itself
    #[default]
    ProviderIdentity,
    /// The resolved display name
    DisplayName,
}

/// Discovery settings
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Event namespace (`<ns>:requestProvider`)
    pub namespace: String,
    /// How long announcements are accepted
    pub window: Duration,
    pub dedup_key: DedupKey,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            window: Duration::from_millis(500),
            dedup_key: DedupKey::ProviderIdentity,
        }
    }
}

/// Where a handle came from
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSource {
    Announced {
        rdns: Option<String>,
        uuid: Option<String>,
    },
    Injected,
}

/// One discovered wallet provider
#[derive(Clone)]
pub struct ProviderHandle {
    pub provider: Arc<dyn Provider>,
    pub display_name: String,
    pub source: ProviderSource,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("display_name", &self.display_name)
            .field("source", &self.source)
            .finish()
    }
}

/// Discovers wallet providers in one execution context
pub struct ProviderRegistry {
    context: Arc<dyn ExecutionContext>,
    config: DiscoveryConfig,
}

impl ProviderRegistry {
    pub fn new(context: Arc<dyn ExecutionContext>, config: DiscoveryConfig) -> Self {
        Self { context, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover providers; resolves after the discovery window, never fails.
    ///
    /// Handles are built fresh on every call.
    pub async fn discover(&self) -> Vec<ProviderHandle> {
        let announced = self.collect_announcements().await;

        if !announced.is_empty() {
            let handles = self.from_announcements(announced);
            info!(
                origin = %self.context.origin(),
                count = handles.len(),
                "Discovered announced providers"
            );
            return handles;
        }

        let handles = self.from_injected_global();
        if handles.is_empty() {
            debug!(origin = %self.context.origin(), "No wallet providers found");
        } else {
            info!(
                origin = %self.context.origin(),
                count = handles.len(),
                "Using injected global provider(s)"
            );
        }
        handles
    }

    /// Broadcast the request and gather announcements for one window
    async fn collect_announcements(&self) -> Vec<ProviderDetail> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let guard = ListenerGuard::install(
            self.context.clone(),
            &announce_event(&self.config.namespace),
            tx,
        );
        self.context
            .dispatch_event(ContextEvent::bare(request_event(&self.config.namespace)));

        tokio::time::sleep(self.config.window).await;
        drop(guard);

        let mut announced = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::Announce(detail) = event.payload {
                announced.push(detail);
            }
        }
        announced
    }

    fn from_announcements(&self, announced: Vec<ProviderDetail>) -> Vec<ProviderHandle> {
        let mut seen_refs = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut handles = Vec::new();

        for detail in announced {
            let display_name = detail
                .info
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .or_else(|| detail.info.rdns.clone().filter(|rdns| !rdns.is_empty()))
                .or_else(|| flag_name(detail.provider.as_ref()))
                .unwrap_or_else(|| format!("wallet:{}", handles.len()));

            let fresh = match self.config.dedup_key {
                DedupKey::ProviderIdentity => seen_refs.insert(provider_identity(&detail.provider)),
                DedupKey::DisplayName => seen_names.insert(display_name.clone()),
            };
            if !fresh {
                debug!(wallet = %display_name, "Dropping duplicate announcement");
                continue;
            }

            handles.push(ProviderHandle {
                provider: detail.provider,
                display_name,
                source: ProviderSource::Announced {
                    rdns: detail.info.rdns,
                    uuid: detail.info.uuid,
                },
            });
        }

        handles
    }

    fn from_injected_global(&self) -> Vec<ProviderHandle> {
        let Some(global) = self.context.injected_provider() else {
            return Vec::new();
        };

        let subs = global.sub_providers();
        let providers = if subs.is_empty() { vec![global] } else { subs };

        providers
            .into_iter()
            .enumerate()
            .map(|(index, provider)| ProviderHandle {
                display_name: flag_name(provider.as_ref())
                    .unwrap_or_else(|| format!("legacy:{}", index)),
                provider,
                source: ProviderSource::Injected,
            })
            .collect()
    }
}

/// Vendor name from capability flags
fn flag_name(provider: &dyn Provider) -> Option<String> {
    KNOWN_FLAGS
        .iter()
        .find(|(flag, _)| provider.has_flag(flag))
        .map(|(_, name)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Window;
    use crate::provider::simulated::{spawn_announcer, SimulatedProvider};
    use crate::provider::ProviderInfo;
    use tokio::time::Instant;

    fn registry(window: &Arc<Window>, dedup_key: DedupKey) -> ProviderRegistry {
        ProviderRegistry::new(
            window.clone(),
            DiscoveryConfig {
                dedup_key,
                ..Default::default()
            },
        )
    }

    fn announce(window: &Arc<Window>, provider: Arc<dyn Provider>, info: ProviderInfo) {
        spawn_announcer(
            window,
            DEFAULT_NAMESPACE,
            ProviderDetail { provider, info },
            Duration::ZERO,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_reference_collapses() {
        let window = Window::new("https://top.example");
        let provider: Arc<dyn Provider> = Arc::new(SimulatedProvider::new(["0x1"]));
        for _ in 0..3 {
            announce(&window, provider.clone(), ProviderInfo::named("MetaMask"));
        }

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].display_name, "MetaMask");
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_references_with_same_name_are_kept() {
        let window = Window::new("https://top.example");
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x1"])),
            ProviderInfo::named("Wallet"),
        );
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x2"])),
            ProviderInfo::named("Wallet"),
        );

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        assert_eq!(handles.len(), 2);
        assert!(handles.iter().all(|h| h.display_name == "Wallet"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_dedup_collapses_colliding_names() {
        let window = Window::new("https://top.example");
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x1"])),
            ProviderInfo::named("Wallet"),
        );
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x2"])),
            ProviderInfo::named("Wallet"),
        );

        let handles = registry(&window, DedupKey::DisplayName).discover().await;
        assert_eq!(handles.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_name_priority() {
        let window = Window::new("https://top.example");
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x1"])),
            ProviderInfo {
                rdns: Some("io.rabby".to_string()),
                ..Default::default()
            },
        );
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x2"])),
            ProviderInfo::default(),
        );

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        let names: Vec<_> = handles.iter().map(|h| h.display_name.as_str()).collect();
        assert_eq!(names, vec!["io.rabby", "wallet:1"]);
        assert_eq!(
            handles[0].source,
            ProviderSource::Announced {
                rdns: Some("io.rabby".to_string()),
                uuid: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_announcement_is_ignored() {
        let window = Window::new("https://top.example");
        spawn_announcer(
            &window,
            DEFAULT_NAMESPACE,
            ProviderDetail {
                provider: Arc::new(SimulatedProvider::new(["0x1"])),
                info: ProviderInfo::named("Slow"),
            },
            Duration::from_millis(800),
        );

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        assert!(handles.is_empty());
        assert_eq!(window.listener_count(&announce_event(DEFAULT_NAMESPACE)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_injected_global() {
        let window = Window::new("https://top.example");
        window.set_injected_provider(Arc::new(
            SimulatedProvider::new(["0x1"]).with_flag("isCoinbaseWallet"),
        ));

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].display_name, "Coinbase");
        assert_eq!(handles[0].source, ProviderSource::Injected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_sub_providers_enumerated() {
        let window = Window::new("https://top.example");
        let subs: Vec<Arc<dyn Provider>> = vec![
            Arc::new(SimulatedProvider::new(["0x1"]).with_flag("isMetaMask")),
            Arc::new(SimulatedProvider::new(["0x2"])),
        ];
        window.set_injected_provider(Arc::new(
            SimulatedProvider::new(Vec::<String>::new()).with_sub_providers(subs),
        ));

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        let names: Vec<_> = handles.iter().map(|h| h.display_name.as_str()).collect();
        assert_eq!(names, vec!["MetaMask", "legacy:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_announcements_win_over_injected_global() {
        let window = Window::new("https://top.example");
        window.set_injected_provider(Arc::new(SimulatedProvider::new(["0x9"])));
        announce(
            &window,
            Arc::new(SimulatedProvider::new(["0x1"])),
            ProviderInfo::named("Announced"),
        );

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].display_name, "Announced");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_context_resolves_within_window() {
        let window = Window::new("https://top.example");
        let start = Instant::now();

        let handles = registry(&window, DedupKey::ProviderIdentity).discover().await;

        assert!(handles.is_empty());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(510));
    }
}
