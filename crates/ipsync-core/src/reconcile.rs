//! Record reconciliation
//!
//! Converges the address records of every resolved zone to a newly observed
//! IP. Work is split in two:
//!
//! - [`plan_records`] is pure: it turns (zone, family, ip, ttl, existing
//!   remote records) into create/update actions.
//! - [`Reconciler`] performs the I/O: for each changed family × zone unit it
//!   lists the remote records, plans, and applies the actions, with bounded
//!   concurrency at both levels.
//!
//! Reconciliation never deletes a remote record.

use std::collections::HashMap;
use std::net::IpAddr;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{AddressFamily, RecordPayload, RecordType, RemoteRecord, ZoneProvider};
use crate::zones::ResolvedZone;

/// Default number of zone/family units in flight
pub const DEFAULT_ZONE_CONCURRENCY: usize = 10;

/// Default number of record calls in flight within one unit
pub const DEFAULT_RECORD_CONCURRENCY: usize = 10;

/// A record as it should exist after reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    pub zone_id: String,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

impl DesiredRecord {
    /// Body for the provider's create/update call
    pub fn payload(&self) -> RecordPayload {
        RecordPayload::new(self.record_type, self.name.clone(), self.content.clone(), self.ttl)
    }
}

/// One provider call the reconciler intends to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// No remote record matched; create one
    Create(DesiredRecord),
    /// A remote record matched; overwrite it
    Update {
        /// Identifier of the matched remote record
        record_id: String,
        desired: DesiredRecord,
        /// The remote content already equals the desired content
        ///
        /// The update is issued anyway so the TTL is re-applied.
        unchanged: bool,
    },
}

impl RecordAction {
    pub fn desired(&self) -> &DesiredRecord {
        match self {
            RecordAction::Create(desired) => desired,
            RecordAction::Update { desired, .. } => desired,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, RecordAction::Create(_))
    }
}

/// Desired records for every domain of a zone
pub fn desired_records(
    zone: &ResolvedZone,
    family: AddressFamily,
    ip: IpAddr,
    ttl: u32,
) -> Vec<DesiredRecord> {
    let record_type = family.record_type();
    zone.domains()
        .iter()
        .map(|domain| DesiredRecord {
            zone_id: zone.id.clone(),
            record_type,
            name: domain.clone(),
            content: ip.to_string(),
            ttl,
        })
        .collect()
}

/// Plan the calls that converge a zone's records of one family to `ip`
///
/// Each configured domain yields exactly one action. A desired record is
/// matched to a remote record by exact name and record type; when the
/// provider holds several records with the same key, the first listed one is
/// used. Matched records are updated (carrying the remote id), unmatched
/// ones are created.
pub fn plan_records(
    zone: &ResolvedZone,
    family: AddressFamily,
    ip: IpAddr,
    ttl: u32,
    existing: &[RemoteRecord],
) -> Vec<RecordAction> {
    let mut by_key: HashMap<(&str, RecordType), &RemoteRecord> = HashMap::new();
    for record in existing {
        by_key
            .entry((record.name.as_str(), record.record_type))
            .or_insert(record);
    }

    desired_records(zone, family, ip, ttl)
        .into_iter()
        .map(|desired| match by_key.get(&(desired.name.as_str(), desired.record_type)) {
            Some(remote) => RecordAction::Update {
                record_id: remote.id.clone(),
                unchanged: remote.content == desired.content,
                desired,
            },
            None => RecordAction::Create(desired),
        })
        .collect()
}

/// Concurrency bounds of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileLimits {
    /// Zone/family units in flight
    pub zone_concurrency: usize,
    /// Record calls in flight within one unit
    pub record_concurrency: usize,
}

impl Default for ReconcileLimits {
    fn default() -> Self {
        Self {
            zone_concurrency: DEFAULT_ZONE_CONCURRENCY,
            record_concurrency: DEFAULT_RECORD_CONCURRENCY,
        }
    }
}

/// A record call that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedChange {
    Created {
        name: String,
        record_type: RecordType,
        content: String,
        record_id: String,
    },
    Updated {
        name: String,
        record_type: RecordType,
        content: String,
        record_id: String,
        unchanged: bool,
    },
}

/// A zone/family unit that stopped on a provider error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub family: AddressFamily,
    pub zone: String,
    pub error: String,
}

/// Aggregate result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Successful record calls, in completion order
    pub changes: Vec<AppliedChange>,
    /// Units that were aborted by a provider error
    pub failures: Vec<UnitFailure>,
}

impl ReconcileReport {
    /// Number of records created or updated
    pub fn mutated(&self) -> usize {
        self.changes.len()
    }

    pub fn created(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, AppliedChange::Created { .. }))
            .count()
    }

    pub fn updated(&self) -> usize {
        self.mutated() - self.created()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct UnitOutcome {
    family: AddressFamily,
    zone: String,
    changes: Vec<AppliedChange>,
    error: Option<Error>,
}

/// Applies planned record changes through a [`ZoneProvider`]
pub struct Reconciler<'a> {
    provider: &'a dyn ZoneProvider,
    limits: ReconcileLimits,
}

impl<'a> Reconciler<'a> {
    pub fn new(provider: &'a dyn ZoneProvider, limits: ReconcileLimits) -> Self {
        Self { provider, limits }
    }

    /// Converge every (family, zone) pair to the family's new address
    ///
    /// Units run concurrently, at most `zone_concurrency` at a time, with no
    /// ordering between them. A provider failure aborts only its own unit;
    /// calls already issued are not rolled back.
    pub async fn reconcile(
        &self,
        changes: &[(AddressFamily, IpAddr)],
        zones: &[ResolvedZone],
        ttl: u32,
    ) -> ReconcileReport {
        // Collected eagerly so the returned future stays Send.
        let units: Vec<_> = changes
            .iter()
            .flat_map(|&(family, ip)| zones.iter().map(move |zone| (family, ip, zone)))
            .map(|(family, ip, zone)| self.reconcile_unit(family, ip, zone, ttl))
            .collect();

        let outcomes: Vec<UnitOutcome> = stream::iter(units)
            .buffer_unordered(self.limits.zone_concurrency.max(1))
            .collect()
            .await;

        let mut report = ReconcileReport::default();
        for outcome in outcomes {
            report.changes.extend(outcome.changes);
            if let Some(error) = outcome.error {
                warn!(
                    "Reconciling {} records of zone {} failed: {}",
                    outcome.family.record_type(),
                    outcome.zone,
                    error
                );
                report.failures.push(UnitFailure {
                    family: outcome.family,
                    zone: outcome.zone,
                    error: error.to_string(),
                });
            }
        }

        report
    }

    async fn reconcile_unit(
        &self,
        family: AddressFamily,
        ip: IpAddr,
        zone: &ResolvedZone,
        ttl: u32,
    ) -> UnitOutcome {
        let mut outcome = UnitOutcome {
            family,
            zone: zone.name().to_string(),
            changes: Vec::new(),
            error: None,
        };

        let existing = match self.provider.list_records(&zone.id, family.record_type()).await {
            Ok(records) => records,
            Err(e) => {
                outcome.error = Some(self.call_failed(e));
                return outcome;
            }
        };

        let actions = plan_records(zone, family, ip, ttl, &existing);
        debug!(
            "Zone {}: {} {} record(s) planned against {} existing",
            zone.name(),
            actions.len(),
            family.record_type(),
            existing.len()
        );

        let calls: Vec<_> = actions.iter().map(|action| self.apply(action)).collect();
        let mut applied =
            stream::iter(calls).buffer_unordered(self.limits.record_concurrency.max(1));

        while let Some(result) = applied.next().await {
            match result {
                Ok(change) => outcome.changes.push(change),
                Err(e) => {
                    // Dropping the stream abandons the calls still in flight.
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }

    async fn apply(&self, action: &RecordAction) -> Result<AppliedChange> {
        let desired = action.desired();
        let payload = desired.payload();

        match action {
            RecordAction::Create(_) => {
                let record_id = self
                    .provider
                    .create_record(&desired.zone_id, &payload)
                    .await
                    .map_err(|e| self.call_failed(e))?;
                info!(
                    "Created {} record {} -> {}",
                    desired.record_type, desired.name, desired.content
                );
                Ok(AppliedChange::Created {
                    name: desired.name.clone(),
                    record_type: desired.record_type,
                    content: desired.content.clone(),
                    record_id,
                })
            }
            RecordAction::Update {
                record_id,
                unchanged,
                ..
            } => {
                if *unchanged {
                    debug!(
                        "{} record {} already points at {}, updating anyway",
                        desired.record_type, desired.name, desired.content
                    );
                }
                self.provider
                    .update_record(&desired.zone_id, record_id, &payload)
                    .await
                    .map_err(|e| self.call_failed(e))?;
                info!(
                    "Updated {} record {} -> {}",
                    desired.record_type, desired.name, desired.content
                );
                Ok(AppliedChange::Updated {
                    name: desired.name.clone(),
                    record_type: desired.record_type,
                    content: desired.content.clone(),
                    record_id: record_id.clone(),
                    unchanged: *unchanged,
                })
            }
        }
    }

    fn call_failed(&self, error: Error) -> Error {
        match error {
            Error::ProviderCallFailed { .. } => error,
            other => Error::provider(self.provider.provider_name(), other.to_string()),
        }
    }
}
