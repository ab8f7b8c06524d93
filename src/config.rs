//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::channel::{policy::normalize_origin, OriginPolicy, DEFAULT_MESSAGE_TYPE};
use crate::probe::AccountProbe;
use crate::provider::{
    AccountsBehavior, DedupKey, DiscoveryConfig, PermissionScope, ProviderError, ProviderInfo,
    SimulatedWallet, DEFAULT_NAMESPACE,
};
use crate::tracker::{TargetContext, TrackerOptions};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    /// How long announcements are collected
    #[serde(default = "default_discovery_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub dedup_key: DedupKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSettings {
    /// Per-provider deadline; 0 disables it
    #[serde(default = "default_probe_deadline_ms")]
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default = "default_context_prefix")]
    pub context_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSettings {
    /// Sender origins accepted by the receiver; empty accepts everyone
    #[serde(default)]
    pub trusted_origins: Vec<String>,
}

/// Simulated page used by the `demo` and `discover` commands
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_top_origin")]
    pub top_origin: String,
    #[serde(default = "default_frame_origin")]
    pub frame_origin: String,
    #[serde(default = "default_top_prefix")]
    pub top_context_prefix: String,
    #[serde(default = "default_demo_wallets")]
    pub wallets: Vec<DemoWalletConfig>,
}

/// One simulated wallet extension
#[derive(Debug, Clone, Deserialize)]
pub struct DemoWalletConfig {
    pub name: String,
    #[serde(default)]
    pub rdns: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Origins the user connected the wallet to
    #[serde(default)]
    pub authorized_origins: Vec<String>,
    #[serde(default = "default_permission_scope")]
    pub permission_scope: PermissionScope,
    #[serde(default = "default_true")]
    pub announces: bool,
    #[serde(default)]
    pub injects_global: bool,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Delay before answering a discovery request
    #[serde(default)]
    pub announce_delay_ms: u64,
    #[serde(default)]
    pub response_delay_ms: u64,
    #[serde(default)]
    pub hangs: bool,
    /// Reject every account query with this message
    #[serde(default)]
    pub reject_with: Option<String>,
}

impl DemoWalletConfig {
    pub fn to_wallet(&self) -> SimulatedWallet {
        let behavior = if self.hangs {
            AccountsBehavior::Hang
        } else if let Some(message) = &self.reject_with {
            AccountsBehavior::Reject(ProviderError::Other(message.clone()))
        } else if self.response_delay_ms > 0 {
            AccountsBehavior::Delay(Duration::from_millis(self.response_delay_ms))
        } else {
            AccountsBehavior::Respond
        };

        let mut wallet = SimulatedWallet::new(self.name.clone());
        wallet.info = ProviderInfo {
            name: Some(self.name.clone()),
            rdns: self.rdns.clone(),
            ..Default::default()
        };
        wallet.accounts = self.accounts.clone();
        wallet.authorized_origins = self.authorized_origins.clone();
        wallet.permission_scope = self.permission_scope;
        wallet.announces = self.announces;
        wallet.announce_delay = Duration::from_millis(self.announce_delay_ms);
        wallet.injects_global = self.injects_global;
        wallet.flags = self.flags.clone();
        wallet.behavior = behavior;
        wallet
    }
}

fn default_discovery_window_ms() -> u64 {
    500
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_probe_deadline_ms() -> u64 {
    1500
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_message_type() -> String {
    DEFAULT_MESSAGE_TYPE.to_string()
}

fn default_context_prefix() -> String {
    "dapp-tracker".to_string()
}

fn default_top_origin() -> String {
    "https://dapp.example".to_string()
}

fn default_frame_origin() -> String {
    "https://tracker.example".to_string()
}

fn default_top_prefix() -> String {
    "top-level".to_string()
}

fn default_permission_scope() -> PermissionScope {
    PermissionScope::TopLevel
}

fn default_true() -> bool {
    true
}

fn default_demo_wallets() -> Vec<DemoWalletConfig> {
    vec![
        DemoWalletConfig {
            name: "MetaMask".to_string(),
            rdns: Some("io.metamask".to_string()),
            accounts: vec!["0x5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c".to_string()],
            authorized_origins: vec![default_top_origin()],
            permission_scope: PermissionScope::TopLevel,
            announces: true,
            injects_global: false,
            flags: vec!["isMetaMask".to_string()],
            announce_delay_ms: 0,
            response_delay_ms: 0,
            hangs: false,
            reject_with: None,
        },
        DemoWalletConfig {
            name: "Rabby".to_string(),
            rdns: Some("io.rabby".to_string()),
            accounts: vec!["0x8ba1f109551bd432803012645ac136ddd64dba72".to_string()],
            authorized_origins: vec![default_top_origin()],
            permission_scope: PermissionScope::PerFrame,
            announces: true,
            injects_global: false,
            flags: vec!["isRabby".to_string()],
            announce_delay_ms: 0,
            response_delay_ms: 0,
            hangs: false,
            reject_with: None,
        },
    ]
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            window_ms: default_discovery_window_ms(),
            namespace: default_namespace(),
            dedup_key: DedupKey::default(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            deadline_ms: default_probe_deadline_ms(),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            message_type: default_message_type(),
            context_prefix: default_context_prefix(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            top_origin: default_top_origin(),
            frame_origin: default_frame_origin(),
            top_context_prefix: default_top_prefix(),
            wallets: default_demo_wallets(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings::default(),
            probe: ProbeSettings::default(),
            tracker: TrackerSettings::default(),
            channel: ChannelSettings::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("discovery.window_ms", default_discovery_window_ms() as i64)?
            .set_default("probe.deadline_ms", default_probe_deadline_ms() as i64)?
            .set_default("tracker.interval_ms", default_interval_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix PROBE_)
            .add_source(
                config::Environment::with_prefix("PROBE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("channel.trusted_origins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.discovery.window_ms == 0 {
            anyhow::bail!("discovery.window_ms must be positive");
        }

        if self.discovery.namespace.trim().is_empty() {
            anyhow::bail!("discovery.namespace cannot be empty");
        }

        if self.tracker.interval_ms == 0 {
            anyhow::bail!("tracker.interval_ms must be positive");
        }

        if self.tracker.message_type.trim().is_empty() {
            anyhow::bail!("tracker.message_type cannot be empty");
        }

        if self.tracker.context_prefix.trim().is_empty() {
            anyhow::bail!("tracker.context_prefix cannot be empty");
        }

        for origin in &self.channel.trusted_origins {
            normalize_origin(origin)
                .with_context(|| format!("Invalid trusted origin: {}", origin))?;
        }

        for origin in [&self.demo.top_origin, &self.demo.frame_origin] {
            normalize_origin(origin).with_context(|| format!("Invalid demo origin: {}", origin))?;
        }

        // A run can outlast the interval; ticks are then skipped
        let worst_case_ms = self.worst_case_run_ms();
        if self.probe.deadline_ms > 0 && worst_case_ms > self.tracker.interval_ms {
            tracing::warn!(
                "A tracker run may take {}ms, longer than tracker.interval_ms ({}ms)",
                worst_case_ms,
                self.tracker.interval_ms
            );
        }

        Ok(())
    }

    /// Upper bound of one demo run: the discovery window plus every deadline
    fn worst_case_run_ms(&self) -> u64 {
        let wallets = self.demo.wallets.len().max(1) as u64;
        self.discovery
            .window_ms
            .saturating_add(self.probe.deadline_ms.saturating_mul(wallets))
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            namespace: self.discovery.namespace.clone(),
            window: Duration::from_millis(self.discovery.window_ms),
            dedup_key: self.discovery.dedup_key,
        }
    }

    pub fn account_probe(&self) -> AccountProbe {
        match self.probe.deadline_ms {
            0 => AccountProbe::new(None),
            ms => AccountProbe::new(Some(Duration::from_millis(ms))),
        }
    }

    /// Tracker options for a subordinate context reporting to its parent
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            target: TargetContext::Parent,
            message_type: self.tracker.message_type.clone(),
            interval: Duration::from_millis(self.tracker.interval_ms),
            context_prefix: self.tracker.context_prefix.clone(),
            sink: None,
        }
    }

    pub fn origin_policy(&self) -> crate::error::Result<OriginPolicy> {
        OriginPolicy::from_origins(&self.channel.trusted_origins)
    }

    /// Human-readable configuration
    pub fn display(&self) -> String {
        format!(
            r#"Configuration:
  Discovery:
    namespace: {}
    window: {}ms
    dedup_key: {:?}
  Probe:
    deadline: {}
  Tracker:
    interval: {}ms
    message_type: {}
    context_prefix: {}
  Channel:
    trusted_origins: {}
  Demo:
    top_origin: {}
    frame_origin: {}
    wallets: {}
"#,
            self.discovery.namespace,
            self.discovery.window_ms,
            self.discovery.dedup_key,
            if self.probe.deadline_ms == 0 {
                "(disabled)".to_string()
            } else {
                format!("{}ms", self.probe.deadline_ms)
            },
            self.tracker.interval_ms,
            self.tracker.message_type,
            self.tracker.context_prefix,
            if self.channel.trusted_origins.is_empty() {
                "(any - permissive)".to_string()
            } else {
                self.channel.trusted_origins.join(", ")
            },
            self.demo.top_origin,
            self.demo.frame_origin,
            self.demo
                .wallets
                .iter()
                .map(|w| w.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discovery.window_ms, 500);
        assert_eq!(config.probe.deadline_ms, 1500);
        assert_eq!(config.tracker.interval_ms, 5000);
        assert_eq!(config.tracker.message_type, "walletExposureFromIframe");
        assert!(config.validate().is_ok());
        assert!(config.origin_policy().unwrap().is_permissive());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[discovery]
window_ms = 2000
dedup_key = "display_name"

[probe]
deadline_ms = 0

[channel]
trusted_origins = ["https://tracker.example"]

[[demo.wallets]]
name = "Coinbase"
accounts = ["0x1"]
permission_scope = "per_frame"
hangs = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.discovery.window_ms, 2000);
        assert_eq!(config.discovery.dedup_key, DedupKey::DisplayName);
        assert_eq!(config.account_probe().deadline(), None);
        assert!(!config.origin_policy().unwrap().is_permissive());

        let wallet = config.demo.wallets[0].to_wallet();
        assert_eq!(wallet.permission_scope, PermissionScope::PerFrame);
        assert_eq!(wallet.behavior, AccountsBehavior::Hang);
        assert!(wallet.announces);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.demo.wallets.len(), 2);
        assert_eq!(config.discovery.namespace, "eip6963");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tracker.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.channel.trusted_origins = vec!["not a url".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.discovery.namespace = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_deadline_validates() {
        let mut config = Config::default();
        config.probe.deadline_ms = u64::MAX;
        assert!(config.validate().is_ok());
        assert_eq!(config.worst_case_run_ms(), u64::MAX);

        config.discovery.window_ms = u64::MAX;
        assert!(config.validate().is_ok());
        assert_eq!(config.worst_case_run_ms(), u64::MAX);

        let config = Config::default();
        assert_eq!(config.worst_case_run_ms(), 500 + 1500 * 2);
    }
}
