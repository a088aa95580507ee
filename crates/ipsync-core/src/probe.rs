//! Probe aggregation
//!
//! Runs the [`AddressResolver`] once per requested address family and
//! collects every outcome into a [`ProbeSet`]. A failure in one family is
//! recorded and never affects the others; [`probe_all`] itself cannot fail.

use std::net::IpAddr;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::traits::{AddressFamily, AddressResolver, ResolveOptions};

/// Outcome of probing one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Which family was probed
    pub family: AddressFamily,
    /// The validated address, or why none was found
    pub outcome: Result<IpAddr, ResolveError>,
}

impl ProbeResult {
    pub fn success(family: AddressFamily, ip: IpAddr) -> Self {
        Self {
            family,
            outcome: Ok(ip),
        }
    }

    pub fn failure(family: AddressFamily, error: ResolveError) -> Self {
        Self {
            family,
            outcome: Err(error),
        }
    }

    /// The resolved address, if the probe succeeded
    pub fn ip(&self) -> Option<IpAddr> {
        self.outcome.as_ref().ok().copied()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The results of one resolution cycle, one entry per requested family
///
/// A `ProbeSet` is produced whole by [`probe_all`] and never mutated after;
/// the scheduler keeps the last one as the baseline for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeSet {
    results: Vec<ProbeResult>,
}

impl ProbeSet {
    /// Build a set from individual results
    ///
    /// Later entries for an already-present family are dropped so that
    /// families stay unique.
    pub fn new(results: impl IntoIterator<Item = ProbeResult>) -> Self {
        let mut unique: Vec<ProbeResult> = Vec::new();
        for result in results {
            if !unique.iter().any(|r| r.family == result.family) {
                unique.push(result);
            }
        }
        Self { results: unique }
    }

    /// Result for a family, if it was probed
    pub fn get(&self, family: AddressFamily) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.family == family)
    }

    /// Resolved address for a family, if it was probed successfully
    pub fn ip(&self, family: AddressFamily) -> Option<IpAddr> {
        self.get(family).and_then(ProbeResult::ip)
    }

    /// All results, in request order
    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter()
    }

    /// Successful (family, address) pairs, in request order
    pub fn successes(&self) -> impl Iterator<Item = (AddressFamily, IpAddr)> + '_ {
        self.results
            .iter()
            .filter_map(|r| r.ip().map(|ip| (r.family, ip)))
    }

    /// Failed (family, cause) pairs, in request order
    pub fn failures(&self) -> impl Iterator<Item = (AddressFamily, &ResolveError)> + '_ {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.family, e)))
    }

    /// Families that resolved successfully
    pub fn usable_families(&self) -> Vec<AddressFamily> {
        self.successes().map(|(family, _)| family).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Probe every requested family concurrently
///
/// All resolver calls run interleaved on the current task. Each outcome is
/// captured independently; the returned set has one entry per distinct
/// requested family, in request order.
pub async fn probe_all(
    resolver: &dyn AddressResolver,
    families: &[AddressFamily],
    options: &ResolveOptions,
    cancel: &CancellationToken,
) -> ProbeSet {
    let mut requested: Vec<AddressFamily> = Vec::with_capacity(families.len());
    for family in families {
        if !requested.contains(family) {
            requested.push(*family);
        }
    }

    let outcomes = join_all(
        requested
            .iter()
            .map(|family| resolver.resolve(*family, options, cancel)),
    )
    .await;

    let results = requested
        .into_iter()
        .zip(outcomes)
        .map(|(family, outcome)| {
            match &outcome {
                Ok(ip) => debug!("Probe {} via {} -> {}", family, resolver.resolver_name(), ip),
                Err(e) => warn!("Probe {} via {} failed: {}", family, resolver.resolver_name(), e),
            }
            ProbeResult { family, outcome }
        });

    ProbeSet::new(results)
}
