// # Cloudflare Zone Provider
//
// `ZoneProvider` implementation on top of the Cloudflare API v4.
//
// ## Scope
//
// - One HTTP exchange per call (listings follow pagination until the last page)
// - HTTP timeout of 30 seconds
// - Status codes mapped to specific errors (401/403, 404, 409, 429, 5xx)
// - Dry-run mode: reads hit the API, writes are only logged
// - No retries, no caching, no background tasks. The engine decides when
//   to call again.
//
// ## Security
//
// - The API token never appears in logs or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&page=N&per_page=100`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

mod types;

use async_trait::async_trait;
use ipsync_core::config::ProviderConfig;
use ipsync_core::traits::{
    RecordPayload, RecordType, RemoteRecord, RemoteZone, ZoneProvider, ZoneProviderFactory,
};
use ipsync_core::zones::normalize_domain;
use ipsync_core::{Error, ProviderRegistry, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use types::{CloudflareDnsRecord, CloudflareResponse, CloudflareZone, CreatedRecord};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size of zone listings (API maximum)
const ZONES_PER_PAGE: u32 = 50;

/// Page size of record listings
const RECORDS_PER_PAGE: u32 = 100;

/// Id handed back for records "created" in dry-run mode
pub const DRY_RUN_RECORD_ID: &str = "dry-run";

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare zone provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone and record listings)
/// - Log the intended POST/PUT payload
/// - **NOT** modify any DNS record
pub struct CloudflareProvider {
    /// Cloudflare API token (never logged)
    api_token: String,

    /// API root, overridable for tests
    base_url: String,

    client: reqwest::Client,

    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// The token needs Zone:Read and DNS:Edit permissions on every zone the
    /// configured domains fall into.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at another API root (e.g. a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<CloudflareResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let envelope: CloudflareResponse<T> = response.json().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("{}: failed to parse response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{}: {}", context, envelope.error_message()),
            ));
        }

        Ok(envelope)
    }

    /// Fetch every page of a listing
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: &[(&str, &str)],
        per_page: u32,
        context: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(self.url(path))
                .query(filter)
                .query(&[("page", page), ("per_page", per_page)]);
            let envelope: CloudflareResponse<Vec<T>> = self.send(request, context).await?;

            let batch = envelope.result.unwrap_or_default();
            let fetched = batch.len();
            items.extend(batch);

            match envelope.result_info {
                Some(info) if info.has_more() && fetched > 0 => page += 1,
                _ => break,
            }
        }

        debug!("{}: {} item(s) over {} page(s)", context, items.len(), page);
        Ok(items)
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions (status {})",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        409 => Error::provider(
            PROVIDER_NAME,
            format!("{}: conflict, record changed concurrently (status {})", context, status),
        ),
        429 => Error::rate_limited(format!("{}: retry later (status {})", context, status)),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: Cloudflare server error (transient): {} - {}", context, status, error_text),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

#[async_trait]
impl ZoneProvider for CloudflareProvider {
    async fn list_zones(&self) -> Result<Vec<RemoteZone>> {
        let zones: Vec<CloudflareZone> = self
            .list_all("/zones", &[], ZONES_PER_PAGE, "List zones")
            .await?;

        Ok(zones
            .into_iter()
            .map(|zone| RemoteZone::new(zone.id, normalize_domain(&zone.name)))
            .collect())
    }

    async fn list_records(&self, zone_id: &str, record_type: RecordType) -> Result<Vec<RemoteRecord>> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let records: Vec<CloudflareDnsRecord> = self
            .list_all(
                &path,
                &[("type", record_type.as_str())],
                RECORDS_PER_PAGE,
                "List DNS records",
            )
            .await?;

        // The filter is server-side; anything else that slips through is dropped.
        Ok(records
            .into_iter()
            .filter(|record| RecordType::from_api(&record.record_type) == Some(record_type))
            .map(|record| {
                RemoteRecord::new(record.id, record_type, normalize_domain(&record.name), record.content)
            })
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &RecordPayload) -> Result<String> {
        let path = format!("/zones/{}/dns_records", zone_id);

        if self.dry_run {
            info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                path,
                serde_json::to_string(record)?
            );
            return Ok(DRY_RUN_RECORD_ID.to_string());
        }

        let request = self.client.post(self.url(&path)).json(record);
        let envelope: CloudflareResponse<CreatedRecord> = self.send(request, "Create DNS record").await?;

        let created = envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "Create DNS record: response has no result")
        })?;
        debug!("Created record {} in zone {}", created.id, zone_id);
        Ok(created.id)
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, record: &RecordPayload) -> Result<()> {
        let path = format!("/zones/{}/dns_records/{}", zone_id, record_id);

        if self.dry_run {
            info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                path,
                serde_json::to_string(record)?
            );
            return Ok(());
        }

        let request = self.client.put(self.url(&path)).json(record);
        let _: CloudflareResponse<serde_json::Value> = self.send(request, "Update DNS record").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl ZoneProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        let ProviderConfig::Cloudflare { api_token, dry_run } = config;

        // IPSYNC_MODE=dry-run forces dry-run whatever the config says
        let dry_run = *dry_run || dry_run_from_env();

        if dry_run {
            warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Box::new(CloudflareProvider::new(api_token.clone(), dry_run)?))
    }
}

fn dry_run_from_env() -> bool {
    std::env::var("IPSYNC_MODE")
        .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
        .unwrap_or(false)
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ipsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ipsync_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudflareFactory));
}
