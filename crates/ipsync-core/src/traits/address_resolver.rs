// # Address Resolver Trait
//
// Defines the interface for discovering the caller's own public address.
//
// ## Implementations
//
// - OpenDNS "myip" over the DNS wire protocol: `ipsync-resolver` crate
//
// ## Usage
//
// ```rust,ignore
// use ipsync_core::traits::{AddressFamily, AddressResolver, ResolveOptions};
// use tokio_util::sync::CancellationToken;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//     let cancel = CancellationToken::new();
//
//     let ip = resolver
//         .resolve(AddressFamily::V4, &ResolveOptions::default(), &cancel)
//         .await?;
//     println!("public address: {ip}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ResolveError;
use crate::traits::zone_provider::RecordType;

/// Address family of a public IP (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Both families, v4 first
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// The DNS record type that carries an address of this family
    pub fn record_type(self) -> RecordType {
        match self {
            AddressFamily::V4 => RecordType::A,
            AddressFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Short lowercase name ("v4" / "v6")
    pub fn as_str(self) -> &'static str {
        match self {
            AddressFamily::V4 => "v4",
            AddressFamily::V6 => "v6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFamily {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(AddressFamily::V4),
            "v6" | "ipv6" | "6" => Ok(AddressFamily::V6),
            other => Err(crate::Error::invalid_input(format!(
                "Unknown address family '{}'. Valid: v4, v6",
                other
            ))),
        }
    }
}

/// Per-query transport options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// How long to wait for an answer to each attempt
    pub timeout: Duration,
    /// Extra attempts after the first one times out
    pub retries: u32,
}

impl ResolveOptions {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }

    /// Total number of queries that may be sent
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retries: 5,
        }
    }
}

/// Trait for public address resolvers
///
/// A resolver answers one question: "what is my public address in this
/// family?". It performs a single network exchange per call (with its own
/// transport-level retries) and reports a typed failure instead of
/// panicking or retrying at a higher level.
///
/// # Cancellation
///
/// Implementations must observe `cancel` while waiting on the network. A
/// cancelled call releases its transport before returning
/// [`ResolveError::Cancelled`], which is distinct from a timeout.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the public address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: a validated address of exactly the requested family
    /// - `Err(ResolveError)`: why no address could be determined
    async fn resolve(
        &self,
        family: AddressFamily,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<IpAddr, ResolveError>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

/// Helper trait for constructing resolvers by name
pub trait AddressResolverFactory: Send + Sync {
    /// Create an AddressResolver instance
    fn create(&self) -> Result<Box<dyn AddressResolver>, crate::Error>;
}
