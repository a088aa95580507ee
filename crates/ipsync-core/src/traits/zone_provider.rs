// # Zone Provider Trait
//
// Defines the interface to an authoritative DNS provider that organises
// records into zones (zone → list of records).
//
// ## Implementations
//
// - Cloudflare: `ipsync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ipsync_core::traits::{RecordPayload, RecordType, ZoneProvider};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* ZoneProvider implementation */;
//
//     let zones = provider.list_zones().await?;
//     let zone = &zones[0];
//     let records = provider.list_records(&zone.id, RecordType::A).await?;
//
//     let payload = RecordPayload::new(RecordType::A, "home.example.com", "203.0.113.7", 1);
//     match records.iter().find(|r| r.name == payload.name) {
//         Some(existing) => provider.update_record(&zone.id, &existing.id, &payload).await?,
//         None => { provider.create_record(&zone.id, &payload).await?; }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire/API spelling of the type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Parse the API spelling, ignoring any type that isn't an address record
    pub fn from_api(value: &str) -> Option<Self> {
        match value {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A zone as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteZone {
    /// Provider-assigned zone identifier
    pub id: String,
    /// Zone apex name (e.g. "example.com")
    pub name: String,
}

impl RemoteZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A record as read from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// Opaque provider identifier, required for updates
    pub id: String,
    /// Record type
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Current content (the address literal)
    pub content: String,
}

impl RemoteRecord {
    pub fn new(
        id: impl Into<String>,
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type,
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Body of a create or update call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPayload {
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Address literal
    pub content: String,
    /// Time-to-live in seconds (1 = provider default)
    pub ttl: u32,
}

impl RecordPayload {
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            ttl,
        }
    }
}

/// Trait for authoritative-zone providers
///
/// Providers are thin API clients: one HTTP exchange (or one paginated
/// listing) per call, no retries, no caching, no scheduling decisions. The
/// reconciler owns matching and concurrency; the scheduler owns timing.
///
/// # Thread Safety
///
/// Implementations must be usable from many concurrent futures on the same
/// task, so every method takes `&self`.
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    /// List every zone the credentials can see
    async fn list_zones(&self) -> Result<Vec<RemoteZone>, crate::Error>;

    /// List the records of `record_type` in a zone
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record, returning its provider identifier
    async fn create_record(
        &self,
        zone_id: &str,
        record: &RecordPayload,
    ) -> Result<String, crate::Error>;

    /// Overwrite an existing record's content and TTL
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &RecordPayload,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing zone providers from configuration
pub trait ZoneProviderFactory: Send + Sync {
    /// Create a ZoneProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn ZoneProvider>, crate::Error>;
}
