//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Probing the public address of every configured family
//! - Detecting which families changed since the previous cycle
//! - Resolving configured zones against the provider
//! - Reconciling address records of changed families
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ AddressResolver │─── ProbeSet ───┐
//! └─────────────────┘                │
//!                                    ▼
//!                           ┌──────────────┐      baseline
//!                           │  SyncEngine  │◄──── (previous ProbeSet)
//!                           └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌───────────────┐        ┌──────────────────┐        ┌──────────────┐
//! │ zone resolver │        │ ZoneProvider     │        │    Events    │
//! │ (list_zones)  │        │ (create/update)  │        │   (notify)   │
//! └───────────────┘        └──────────────────┘        └──────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Probe all families (failures are captured per family)
//! 2. Compare against the baseline; stop if nothing changed
//! 3. List provider zones and resolve the configured ones (fatal if missing)
//! 4. Reconcile every changed family × zone
//! 5. The loop replaces the baseline and arms the next timer

mod scheduler;

pub use scheduler::Scheduler;

use std::future::Future;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::change::changed_families;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::probe::{ProbeSet, probe_all};
use crate::reconcile::{AppliedChange, ReconcileLimits, ReconcileReport, Reconciler};
use crate::traits::{AddressFamily, AddressResolver, RecordType, ResolveOptions, ZoneProvider};
use crate::zones::{ZoneGroup, group_domains, resolve_zones};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        domains_count: usize,
        zones_count: usize,
    },

    /// All probes of a cycle settled
    ProbeCompleted {
        resolved: Vec<(AddressFamily, IpAddr)>,
        failed: Vec<AddressFamily>,
    },

    /// A family's public address differs from the baseline
    AddressChanged {
        family: AddressFamily,
        previous: Option<IpAddr>,
        current: IpAddr,
    },

    /// No family changed; nothing was sent to the provider
    UpdateSkipped,

    /// A record was created
    RecordCreated {
        name: String,
        record_type: RecordType,
        content: String,
    },

    /// A record was updated
    RecordUpdated {
        name: String,
        record_type: RecordType,
        content: String,
        /// Remote content already matched
        unchanged: bool,
    },

    /// Listing the provider's zones failed; the cycle was abandoned
    ZoneListingFailed {
        error: String,
    },

    /// A zone/family unit stopped on a provider error
    UnitFailed {
        zone: String,
        family: AddressFamily,
        error: String,
    },

    /// A cycle finished
    CycleCompleted {
        mutated: usize,
        failures: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// What one update cycle observed and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Probe results; becomes the next cycle's baseline
    pub probes: ProbeSet,
    /// Families that changed, with their new address
    pub changed: Vec<(AddressFamily, IpAddr)>,
    /// Reconciliation outcome (empty when nothing changed)
    pub report: ReconcileReport,
    /// Set when listing the provider's zones failed
    pub zone_error: Option<String>,
}

impl CycleSummary {
    /// Number of records created or updated
    pub fn mutated(&self) -> usize {
        self.report.mutated()
    }

    /// No provider call of the cycle failed
    pub fn is_success(&self) -> bool {
        self.zone_error.is_none() && self.report.is_success()
    }
}

/// Core sync engine
///
/// The engine runs update cycles on a fixed delay until shut down. The only
/// state carried between cycles is the baseline [`ProbeSet`], which the run
/// loop owns and passes into [`SyncEngine::run_cycle`] by reference.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine runs until a shutdown signal or a fatal error
///
/// ## Concurrency
///
/// Everything runs on the caller's task: probes, zone units and record
/// calls are interleaved with `futures` combinators, nothing is spawned.
pub struct SyncEngine {
    /// Public address discovery
    resolver: Box<dyn AddressResolver>,

    /// DNS provider for zones and records
    provider: Box<dyn ZoneProvider>,

    /// Configured domains, grouped by registrable zone
    groups: Vec<ZoneGroup>,

    /// Families probed each cycle
    families: Vec<AddressFamily>,

    resolve_options: ResolveOptions,

    ttl: u32,

    limits: ReconcileLimits,

    scheduler: Scheduler,

    /// Cancels in-flight probes
    cancel: CancellationToken,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        provider: Box<dyn ZoneProvider>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let groups = group_domains(&config.domains)?;
        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            resolver,
            provider,
            groups,
            families: config.probe.families.clone(),
            resolve_options: config.probe.resolve_options(),
            ttl: config.ttl,
            limits: config.engine.limits(),
            scheduler: Scheduler::new(config.engine.update_interval()),
            cancel: CancellationToken::new(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Token that aborts probes in flight
    ///
    /// Once cancelled, every later probe fails with `Cancelled`, so no
    /// further cycle reports a change.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the engine until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error (a configured zone is missing on the provider)
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// `None` falls back to Ctrl-C, like [`SyncEngine::run()`]. A dropped
    /// sender counts as a shutdown request.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        match shutdown_rx {
            Some(rx) => {
                self.run_until(async {
                    let _ = rx.await;
                })
                .await
            }
            None => self.run().await,
        }
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// The first cycle starts immediately. The next timer is armed only after
    /// a cycle settles, and `shutdown` is observed while the timer is pending.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.emit_event(EngineEvent::Started {
            domains_count: self.groups.iter().map(|g| g.domains.len()).sum(),
            zones_count: self.groups.len(),
        });

        let mut baseline: Option<ProbeSet> = None;

        loop {
            match self.run_cycle(baseline.as_ref()).await {
                Ok(summary) => {
                    // Replaced even when provider calls failed; a failed
                    // update is retried only once the address moves again.
                    baseline = Some(summary.probes);
                }
                Err(e) if e.is_fatal() => {
                    error!("{}", e);
                    self.emit_event(EngineEvent::Stopped {
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    error!("Update cycle failed: {}", e);
                }
            }

            info!(
                "Next update has been scheduled at {}",
                self.scheduler.next_run_at().format("%Y-%m-%d %H:%M:%S %:z")
            );

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    return Ok(());
                }

                _ = self.scheduler.wait() => {}
            }
        }
    }

    /// Run a single update cycle against `baseline`
    ///
    /// # Returns
    ///
    /// - `Ok(summary)`: The cycle settled; provider failures are recorded in
    ///   the summary
    /// - `Err(Error::ZoneNotFound)`: A configured zone does not exist on the
    ///   provider; no record was touched
    pub async fn run_cycle(&self, baseline: Option<&ProbeSet>) -> Result<CycleSummary> {
        let started_at = Utc::now();

        info!("Fetching ips...");
        let probes = probe_all(
            self.resolver.as_ref(),
            &self.families,
            &self.resolve_options,
            &self.cancel,
        )
        .await;
        info!("Received ips: {}", describe_probes(&probes));

        self.emit_event(EngineEvent::ProbeCompleted {
            resolved: probes.successes().collect(),
            failed: probes.failures().map(|(family, _)| family).collect(),
        });

        let changed: Vec<(AddressFamily, IpAddr)> = changed_families(baseline, &probes)
            .into_iter()
            .filter_map(|family| probes.ip(family).map(|ip| (family, ip)))
            .collect();

        let mut summary = CycleSummary {
            started_at,
            probes,
            changed,
            report: ReconcileReport::default(),
            zone_error: None,
        };

        if summary.changed.is_empty() {
            info!("Skip DNS records update. No ip changed");
            self.emit_event(EngineEvent::UpdateSkipped);
            return Ok(summary);
        }

        for (family, ip) in &summary.changed {
            let previous = baseline.and_then(|b| b.ip(*family));
            info!(
                "{} address changed: {} -> {}",
                family,
                previous.map(|ip| ip.to_string()).unwrap_or_else(|| "none".to_string()),
                ip
            );
            self.emit_event(EngineEvent::AddressChanged {
                family: *family,
                previous,
                current: *ip,
            });
        }

        let remote_zones = match self.provider.list_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                let e = match e {
                    Error::ProviderCallFailed { .. } => e,
                    other => Error::provider(self.provider.provider_name(), other.to_string()),
                };
                warn!("Failed to list zones: {}", e);
                self.emit_event(EngineEvent::ZoneListingFailed {
                    error: e.to_string(),
                });
                summary.zone_error = Some(e.to_string());
                return Ok(summary);
            }
        };

        let zones = resolve_zones(&self.groups, &remote_zones)?;

        summary.report = Reconciler::new(self.provider.as_ref(), self.limits)
            .reconcile(&summary.changed, &zones, self.ttl)
            .await;

        for change in &summary.report.changes {
            self.emit_event(match change {
                AppliedChange::Created {
                    name,
                    record_type,
                    content,
                    ..
                } => EngineEvent::RecordCreated {
                    name: name.clone(),
                    record_type: *record_type,
                    content: content.clone(),
                },
                AppliedChange::Updated {
                    name,
                    record_type,
                    content,
                    unchanged,
                    ..
                } => EngineEvent::RecordUpdated {
                    name: name.clone(),
                    record_type: *record_type,
                    content: content.clone(),
                    unchanged: *unchanged,
                },
            });
        }
        for failure in &summary.report.failures {
            self.emit_event(EngineEvent::UnitFailed {
                zone: failure.zone.clone(),
                family: failure.family,
                error: failure.error.clone(),
            });
        }

        info!("{} records have been updated", summary.mutated());
        if !summary.report.is_success() {
            warn!(
                "{} zone update(s) failed this cycle",
                summary.report.failures.len()
            );
        }

        self.emit_event(EngineEvent::CycleCompleted {
            mutated: summary.mutated(),
            failures: summary.report.failures.len(),
        });

        Ok(summary)
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}

fn describe_probes(probes: &ProbeSet) -> String {
    probes
        .iter()
        .map(|result| match &result.outcome {
            Ok(ip) => format!("{}={}", result.family, ip),
            Err(e) => format!("{}=<{}>", result.family, e),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
