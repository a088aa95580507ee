// # ipsyncd - public IP to DNS daemon
//
// Thin integration layer. All sync logic lives in ipsync-core; this binary:
// 1. Reads configuration from environment variables
// 2. Initializes tracing and the runtime
// 3. Registers the resolver and provider
// 4. Probes which address families are usable
// 5. Runs the sync engine until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Provider
// - `IPSYNC_CLOUDFLARE_TOKEN`: Cloudflare API token (required)
// - `IPSYNC_MODE`: `dry-run` to read from the API but only log writes
//
// ### Records
// - `IPSYNC_DOMAINS`: Comma-separated list of domains to manage (required)
// - `IPSYNC_DOMAINS_TTL`: TTL of written records, 1 = automatic (default 1)
//
// ### Discovery
// - `IPSYNC_DNS_TIMEOUT_MS`: Per-attempt DNS timeout (default 5000)
// - `IPSYNC_DNS_RETRIES`: Retries after the first attempt (default 5)
// - `IPSYNC_FAMILIES`: Families to publish (default `v4,v6`)
//
// ### Engine
// - `IPSYNC_UPDATE_INTERVAL`: Delay between cycles, e.g. `5m`, `90s` (default `5m`)
// - `IPSYNC_ZONE_CONCURRENCY`: Zone/family units in flight (default 10)
// - `IPSYNC_RECORD_CONCURRENCY`: Record calls in flight per unit (default 10)
// - `IPSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export IPSYNC_CLOUDFLARE_TOKEN=your_token
// export IPSYNC_DOMAINS=home.example.com,vpn.example.com
// export IPSYNC_UPDATE_INTERVAL=10m
//
// ipsyncd
// ```

use anyhow::{Context, Result};
use ipsync_core::config::{EngineConfig, ProbeConfig, ProviderConfig, SyncConfig};
use ipsync_core::traits::{AddressFamily, ResolveOptions};
use ipsync_core::{EngineEvent, ProviderRegistry, SyncEngine, parse_interval, probe_all};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error, no usable family, or a zone missing on the provider
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IpsyncExitCode> for ExitCode {
    fn from(code: IpsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_token: String,
    dry_run: bool,
    domains: Vec<String>,
    ttl: u32,
    update_interval: Duration,
    dns_timeout_ms: u64,
    dns_retries: u32,
    families: Vec<AddressFamily>,
    zone_concurrency: usize,
    record_concurrency: usize,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let update_interval = env::var("IPSYNC_UPDATE_INTERVAL").unwrap_or_else(|_| "5m".to_string());

        Ok(Self {
            api_token: env::var("IPSYNC_CLOUDFLARE_TOKEN").unwrap_or_default(),
            dry_run: env::var("IPSYNC_MODE")
                .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
                .unwrap_or(false),
            domains: split_list(&env::var("IPSYNC_DOMAINS").unwrap_or_default()),
            ttl: env_or("IPSYNC_DOMAINS_TTL", 1)?,
            update_interval: parse_interval(&update_interval)
                .with_context(|| format!("IPSYNC_UPDATE_INTERVAL '{}'", update_interval))?,
            dns_timeout_ms: env_or("IPSYNC_DNS_TIMEOUT_MS", 5000)?,
            dns_retries: env_or("IPSYNC_DNS_RETRIES", 5)?,
            families: parse_families(&env::var("IPSYNC_FAMILIES").unwrap_or_else(|_| "v4,v6".to_string()))?,
            zone_concurrency: env_or("IPSYNC_ZONE_CONCURRENCY", 10)?,
            record_concurrency: env_or("IPSYNC_RECORD_CONCURRENCY", 10)?,
            log_level: env::var("IPSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Engine-level rules (zones derivable from every domain, positive
    /// bounds) are checked again by `SyncConfig::validate`.
    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!(
                "IPSYNC_CLOUDFLARE_TOKEN is required. \
                Set it via: export IPSYNC_CLOUDFLARE_TOKEN=your_token"
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") || token_lower == "token" {
            anyhow::bail!(
                "IPSYNC_CLOUDFLARE_TOKEN appears to be a placeholder. \
                Use an actual API token from Cloudflare."
            );
        }

        if self.domains.is_empty() {
            anyhow::bail!(
                "IPSYNC_DOMAINS must contain at least one domain. \
                Set it via: export IPSYNC_DOMAINS=home.example.com,vpn.example.com"
            );
        }

        for domain in &self.domains {
            validate_domain_name(domain)?;
        }

        if self.ttl == 0 {
            anyhow::bail!("IPSYNC_DOMAINS_TTL must be > 0 (1 means automatic)");
        }

        if self.dns_timeout_ms == 0 {
            anyhow::bail!("IPSYNC_DNS_TIMEOUT_MS must be > 0");
        }

        if self.families.is_empty() {
            anyhow::bail!("IPSYNC_FAMILIES must name at least one of: v4, v6");
        }

        if self.zone_concurrency == 0 || self.record_concurrency == 0 {
            anyhow::bail!("IPSYNC_ZONE_CONCURRENCY and IPSYNC_RECORD_CONCURRENCY must be > 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IPSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Engine configuration for the given usable families
    fn sync_config(&self, families: Vec<AddressFamily>) -> SyncConfig {
        SyncConfig {
            domains: self.domains.clone(),
            ttl: self.ttl,
            probe: ProbeConfig {
                timeout_ms: self.dns_timeout_ms,
                retries: self.dns_retries,
                families,
            },
            provider: ProviderConfig::Cloudflare {
                api_token: self.api_token.clone(),
                dry_run: self.dry_run,
            },
            engine: EngineConfig {
                update_interval_ms: u64::try_from(self.update_interval.as_millis()).unwrap_or(u64::MAX),
                zone_concurrency: self.zone_concurrency,
                record_concurrency: self.record_concurrency,
                ..EngineConfig::default()
            },
        }
    }
}

/// Read a numeric variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_families(raw: &str) -> Result<Vec<AddressFamily>> {
    let mut families = Vec::new();
    for item in split_list(raw) {
        let family = AddressFamily::from_str(&item).with_context(|| format!("IPSYNC_FAMILIES '{}'", raw))?;
        if !families.contains(&family) {
            families.push(family);
        }
    }
    Ok(families)
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches typos before any API call.
fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

/// Map a daemon failure to its exit code
fn exit_code_for(err: &anyhow::Error) -> IpsyncExitCode {
    match err.downcast_ref::<ipsync_core::Error>() {
        Some(e) if e.is_fatal() => IpsyncExitCode::ConfigError,
        Some(ipsync_core::Error::Config(_)) => IpsyncExitCode::ConfigError,
        _ => IpsyncExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IpsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IpsyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpsyncExitCode::ConfigError.into();
    }

    info!("Starting ipsyncd daemon");
    info!(
        "Configuration loaded: {} domain(s), update interval {:?}",
        config.domains.len(),
        config.update_interval
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpsyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => IpsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ProviderRegistry::new();
    ipsync_resolver::register(&registry);
    ipsync_provider_cloudflare::register(&registry);

    let resolver = registry.create_resolver("opendns")?;

    // Bootstrap: one attempt per family, drop the ones that don't answer.
    let bootstrap = probe_all(
        resolver.as_ref(),
        &config.families,
        &ResolveOptions::new(Duration::from_millis(config.dns_timeout_ms), 0),
        &CancellationToken::new(),
    )
    .await;

    for (family, e) in bootstrap.failures() {
        warn!("Ignoring {} addresses: {}", family, e);
    }

    let families = bootstrap.usable_families();
    if families.is_empty() {
        return Err(ipsync_core::Error::config("No address family could be resolved").into());
    }
    info!(
        "Publishing families: {}",
        families.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
    );

    let sync_config = config.sync_config(families);
    let provider = registry.create_provider(&sync_config.provider)?;
    let (engine, events) = SyncEngine::new(resolver, provider, sync_config)?;

    tokio::spawn(log_events(events));

    let shutdown = shutdown_signal()?;
    engine.run_until(shutdown).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Forward engine events to the debug log
async fn log_events(mut events: tokio::sync::mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Future resolving on the first SIGTERM or SIGINT
///
/// Handlers are installed before the engine starts, so a signal arriving
/// during the first cycle is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future resolving on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api_token: "0123456789abcdef0123456789abcdef01234567".to_string(),
            dry_run: false,
            domains: vec!["home.example.com".to_string()],
            ttl: 1,
            update_interval: Duration::from_secs(300),
            dns_timeout_ms: 5000,
            dns_retries: 5,
            families: AddressFamily::ALL.to_vec(),
            zone_concurrency: 10,
            record_concurrency: 10,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_missing_token_and_domains() {
        let mut config = valid_config();
        config.api_token.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.domains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_placeholder_token() {
        let mut config = valid_config();
        config.api_token = "your_token_here".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_domain_and_level() {
        let mut config = valid_config();
        config.domains.push("bad..example.com".to_string());
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn families_parse_and_dedupe() {
        assert_eq!(
            parse_families("v6, ipv4,v6").unwrap(),
            vec![AddressFamily::V6, AddressFamily::V4]
        );
        assert!(parse_families("v5").is_err());
        assert!(parse_families("").unwrap().is_empty());
    }

    #[test]
    fn sync_config_carries_every_setting() {
        let mut config = valid_config();
        config.dry_run = true;
        config.update_interval = Duration::from_secs(90);

        let sync = config.sync_config(vec![AddressFamily::V4]);

        assert_eq!(sync.probe.families, vec![AddressFamily::V4]);
        assert_eq!(sync.engine.update_interval_ms, 90_000);
        assert!(matches!(sync.provider, ProviderConfig::Cloudflare { dry_run: true, .. }));
        assert!(sync.validate().is_ok());
    }

    #[test]
    fn fatal_core_errors_exit_with_config_code() {
        let missing = anyhow::Error::from(ipsync_core::Error::zone_not_found(vec!["other.org".into()]));
        assert_eq!(exit_code_for(&missing), IpsyncExitCode::ConfigError);

        let no_family = anyhow::Error::from(ipsync_core::Error::config("none"));
        assert_eq!(exit_code_for(&no_family), IpsyncExitCode::ConfigError);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), IpsyncExitCode::RuntimeError);
    }
}
