//! Configuration types for ipsync
//!
//! This module defines all configuration structures used throughout the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reconcile::{DEFAULT_RECORD_CONCURRENCY, DEFAULT_ZONE_CONCURRENCY, ReconcileLimits};
use crate::traits::{AddressFamily, ResolveOptions};
use crate::zones::group_domains;

/// Main ipsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Domains to keep pointed at the public address
    pub domains: Vec<String>,

    /// TTL for written records (1 = provider "automatic")
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Public address discovery settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a configuration with defaults for everything but the inputs
    pub fn new(domains: Vec<String>, provider: ProviderConfig) -> Self {
        Self {
            domains,
            ttl: default_ttl(),
            probe: ProbeConfig::default(),
            provider,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.is_empty() {
            return Err(crate::Error::config("No domains configured"));
        }
        // Every domain must have a registrable zone.
        group_domains(&self.domains)?;

        if self.ttl == 0 {
            return Err(crate::Error::config("TTL must be > 0 (use 1 for automatic)"));
        }

        self.probe.validate()?;
        self.engine.validate()?;
        self.provider.validate()?;

        Ok(())
    }
}

/// Public address discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-attempt DNS timeout (in milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Additional attempts after the first one
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Address families to discover and publish
    #[serde(default = "default_families")]
    pub families: Vec<AddressFamily>,
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("DNS timeout must be > 0"));
        }
        if self.families.is_empty() {
            return Err(crate::Error::config("At least one address family is required"));
        }
        Ok(())
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::new(Duration::from_millis(self.timeout_ms), self.retries)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            families: default_families(),
        }
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Read from the API but only log writes
        #[serde(default)]
        dry_run: bool,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.trim().is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

// Keeps the API token out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare { dry_run, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("dry_run", dry_run)
                .finish(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between the end of one cycle and the start of the next (in milliseconds)
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Zone/family units reconciled concurrently
    #[serde(default = "default_zone_concurrency")]
    pub zone_concurrency: usize,

    /// Record calls in flight within one zone/family unit
    #[serde(default = "default_record_concurrency")]
    pub record_concurrency: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.update_interval_ms == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        if self.zone_concurrency == 0 || self.record_concurrency == 0 {
            return Err(crate::Error::config("Concurrency bounds must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn limits(&self) -> ReconcileLimits {
        ReconcileLimits {
            zone_concurrency: self.zone_concurrency,
            record_concurrency: self.record_concurrency,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            zone_concurrency: default_zone_concurrency(),
            record_concurrency: default_record_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Parse a human-readable interval such as `"5m"`, `"300s"` or `"1500ms"`
///
/// Supported units: `ms`, `s`, `m`, `h`, `d`. A bare number is milliseconds.
/// Zero is rejected.
pub fn parse_interval(input: &str) -> Result<Duration, crate::Error> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| crate::Error::config(format!("Invalid interval '{}'", input)))?;

    let millis_per_unit: u64 = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => {
            return Err(crate::Error::config(format!(
                "Unknown interval unit '{}' in '{}'",
                other, input
            )));
        }
    };

    let millis = value
        .checked_mul(millis_per_unit)
        .ok_or_else(|| crate::Error::config(format!("Interval '{}' is too large", input)))?;
    if millis == 0 {
        return Err(crate::Error::config("Interval must be > 0"));
    }

    Ok(Duration::from_millis(millis))
}

fn default_ttl() -> u32 {
    1
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retries() -> u32 {
    5
}

fn default_families() -> Vec<AddressFamily> {
    AddressFamily::ALL.to_vec()
}

fn default_update_interval_ms() -> u64 {
    300_000
}

fn default_zone_concurrency() -> usize {
    DEFAULT_ZONE_CONCURRENCY
}

fn default_record_concurrency() -> usize {
    DEFAULT_RECORD_CONCURRENCY
}

fn default_event_channel_capacity() -> usize {
    1000
}
