//! Test doubles and common utilities for contract tests
//!
//! Both doubles are cheap `Clone` handles over shared state, so a test keeps
//! one handle for assertions and gives the other to the engine.

#![allow(dead_code)]

use ipsync_core::config::{EngineConfig, ProbeConfig, ProviderConfig, SyncConfig};
use ipsync_core::error::{Error, ResolveError, Result};
use ipsync_core::traits::{
    AddressFamily, AddressResolver, RecordPayload, RecordType, RemoteRecord, RemoteZone,
    ResolveOptions, ZoneProvider,
};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An AddressResolver whose answers the test can change between cycles
#[derive(Clone)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<AddressFamily, std::result::Result<IpAddr, ResolveError>>>>,
    calls: Arc<Mutex<Vec<(AddressFamily, Instant)>>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            answers: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Resolver answering only IPv4
    pub fn v4(ip: &str) -> Self {
        let resolver = Self::new();
        resolver.answer(AddressFamily::V4, ip);
        resolver.fail(AddressFamily::V6, ResolveError::Timeout { attempts: 1 });
        resolver
    }

    pub fn answer(&self, family: AddressFamily, ip: &str) {
        let ip: IpAddr = ip.parse().expect("valid test address");
        self.answers.lock().unwrap().insert(family, Ok(ip));
    }

    pub fn fail(&self, family: AddressFamily, error: ResolveError) {
        self.answers.lock().unwrap().insert(family, Err(error));
    }

    /// Number of resolve() calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Virtual-clock instants of the calls for one family
    pub fn call_times(&self, family: AddressFamily) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| *f == family)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn resolve(
        &self,
        family: AddressFamily,
        _options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<IpAddr, ResolveError> {
        self.calls.lock().unwrap().push((family, Instant::now()));
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        self.answers
            .lock()
            .unwrap()
            .get(&family)
            .cloned()
            .unwrap_or(Err(ResolveError::InvalidAnswer("no scripted answer".into())))
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// One call observed by the RecordingZoneProvider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListZones,
    ListRecords {
        zone_id: String,
        record_type: RecordType,
    },
    Create {
        zone_id: String,
        name: String,
        content: String,
        ttl: u32,
    },
    Update {
        zone_id: String,
        record_id: String,
        name: String,
        content: String,
        ttl: u32,
    },
}

impl ProviderCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, ProviderCall::Create { .. } | ProviderCall::Update { .. })
    }
}

#[derive(Default)]
struct ProviderState {
    zones: Vec<RemoteZone>,
    records: HashMap<String, Vec<RemoteRecord>>,
    next_id: usize,
    calls: Vec<ProviderCall>,
    fail_list_zones: bool,
    failing_zones: HashSet<String>,
    failing_names: HashSet<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// An in-memory ZoneProvider that records every call
///
/// Writes really change the stored records, so a second reconciliation sees
/// the effect of the first.
#[derive(Clone)]
pub struct RecordingZoneProvider {
    state: Arc<Mutex<ProviderState>>,
    /// Simulated latency of every call
    latency: Duration,
}

impl RecordingZoneProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add a zone; its id is `zone-<name>`
    pub fn with_zone(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zones
            .push(RemoteZone::new(zone_id(name), name));
        self
    }

    /// Seed an existing record in a zone
    pub fn with_record(self, zone: &str, id: &str, record_type: RecordType, name: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .entry(zone_id(zone))
            .or_default()
            .push(RemoteRecord::new(id, record_type, name, content));
        self
    }

    pub fn fail_list_zones(&self, fail: bool) {
        self.state.lock().unwrap().fail_list_zones = fail;
    }

    /// Make list_records fail for a zone
    pub fn fail_zone(&self, zone: &str) {
        self.state.lock().unwrap().failing_zones.insert(zone_id(zone));
    }

    /// Make create/update fail for a record name
    pub fn fail_record(&self, name: &str) {
        self.state.lock().unwrap().failing_names.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<ProviderCall> {
        self.calls().into_iter().filter(ProviderCall::is_mutation).collect()
    }

    pub fn list_zones_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProviderCall::ListZones))
            .count()
    }

    /// Records currently stored in a zone
    pub fn records(&self, zone: &str) -> Vec<RemoteRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&zone_id(zone))
            .cloned()
            .unwrap_or_default()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    async fn enter(&self, call: ProviderCall) {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.state.lock().unwrap().in_flight -= 1;
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.state.lock().unwrap().failing_names.contains(name) {
            return Err(Error::http(format!("write to {} rejected", name)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ZoneProvider for RecordingZoneProvider {
    async fn list_zones(&self) -> Result<Vec<RemoteZone>> {
        self.enter(ProviderCall::ListZones).await;
        let state = self.state.lock().unwrap();
        if state.fail_list_zones {
            return Err(Error::http("503 Service Unavailable"));
        }
        Ok(state.zones.clone())
    }

    async fn list_records(&self, zone_id: &str, record_type: RecordType) -> Result<Vec<RemoteRecord>> {
        self.enter(ProviderCall::ListRecords {
            zone_id: zone_id.to_string(),
            record_type,
        })
        .await;
        let state = self.state.lock().unwrap();
        if state.failing_zones.contains(zone_id) {
            return Err(Error::http(format!("listing {} failed", zone_id)));
        }
        Ok(state
            .records
            .get(zone_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type == record_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_record(&self, zone_id: &str, payload: &RecordPayload) -> Result<String> {
        self.enter(ProviderCall::Create {
            zone_id: zone_id.to_string(),
            name: payload.name.clone(),
            content: payload.content.clone(),
            ttl: payload.ttl,
        })
        .await;
        self.check_name(&payload.name)?;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(RemoteRecord::new(id.clone(), payload.record_type, payload.name.clone(), payload.content.clone()));
        Ok(id)
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, payload: &RecordPayload) -> Result<()> {
        self.enter(ProviderCall::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            name: payload.name.clone(),
            content: payload.content.clone(),
            ttl: payload.ttl,
        })
        .await;
        self.check_name(&payload.name)?;

        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| Error::not_found(format!("record {}", record_id)))?;
        record.content = payload.content.clone();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Identifier the RecordingZoneProvider assigns to a zone
pub fn zone_id(name: &str) -> String {
    format!("zone-{}", name)
}

/// Minimal config for the given domains, probing both families
pub fn minimal_config(domains: &[&str]) -> SyncConfig {
    SyncConfig {
        domains: domains.iter().map(|d| d.to_string()).collect(),
        ttl: 1,
        probe: ProbeConfig::default(),
        provider: ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            dry_run: false,
        },
        engine: EngineConfig {
            update_interval_ms: 60_000,
            event_channel_capacity: 100,
            ..EngineConfig::default()
        },
    }
}
