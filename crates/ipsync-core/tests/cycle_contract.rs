//! Contract Test: Single Update Cycle
//!
//! Constraints verified:
//! - The first cycle writes every resolved family
//! - An unchanged address produces no provider call at all
//! - A family that fails to resolve is never written, the others are
//! - Missing zones abort the cycle before any mutation
//! - Provider failures are reported in the summary, not as errors
//!
//! If this test fails, the engine is writing stale or unknown addresses,
//! or touching records before zone validation.

mod common;

use common::*;
use ipsync_core::error::{Error, ResolveError};
use ipsync_core::traits::{AddressFamily, RecordType};
use ipsync_core::{EngineEvent, SyncEngine};
use tokio_test::{assert_err, assert_ok};

fn engine(
    resolver: &ScriptedResolver,
    provider: &RecordingZoneProvider,
    domains: &[&str],
) -> (SyncEngine, tokio::sync::mpsc::Receiver<EngineEvent>) {
    SyncEngine::new(
        Box::new(resolver.clone()),
        Box::new(provider.clone()),
        minimal_config(domains),
    )
    .expect("engine construction succeeds")
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn first_cycle_writes_every_resolved_family() {
    let resolver = ScriptedResolver::new();
    resolver.answer(AddressFamily::V4, "198.51.100.7");
    resolver.answer(AddressFamily::V6, "2001:db8::7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, mut events) = engine(&resolver, &provider, &["home.example.com"]);

    let summary = assert_ok!(engine.run_cycle(None).await);

    assert_eq!(summary.changed.len(), 2);
    assert_eq!(summary.mutated(), 2);
    assert!(summary.is_success());

    let records = provider.records("example.com");
    assert!(records.iter().any(|r| r.record_type == RecordType::A && r.content == "198.51.100.7"));
    assert!(records.iter().any(|r| r.record_type == RecordType::Aaaa && r.content == "2001:db8::7"));

    let events = drain(&mut events);
    assert!(events.contains(&EngineEvent::CycleCompleted {
        mutated: 2,
        failures: 0
    }));
}

#[tokio::test]
async fn unchanged_address_makes_no_provider_calls() {
    let resolver = ScriptedResolver::v4("198.51.100.7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, mut events) = engine(&resolver, &provider, &["home.example.com"]);

    let first = assert_ok!(engine.run_cycle(None).await);
    let calls_after_first = provider.calls().len();

    let second = assert_ok!(engine.run_cycle(Some(&first.probes)).await);

    assert!(second.changed.is_empty());
    assert_eq!(second.mutated(), 0);
    assert_eq!(provider.calls().len(), calls_after_first);
    assert!(drain(&mut events).contains(&EngineEvent::UpdateSkipped));
}

#[tokio::test]
async fn failed_family_is_never_written() {
    let resolver = ScriptedResolver::new();
    resolver.answer(AddressFamily::V4, "198.51.100.7");
    resolver.fail(
        AddressFamily::V6,
        ResolveError::ValidationFailed("not an IPv6 literal".into()),
    );
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, _events) = engine(&resolver, &provider, &["home.example.com"]);

    let summary = assert_ok!(engine.run_cycle(None).await);

    assert_eq!(summary.changed, vec![(AddressFamily::V4, "198.51.100.7".parse().unwrap())]);
    assert!(provider.calls().iter().all(|c| !matches!(
        c,
        ProviderCall::ListRecords {
            record_type: RecordType::Aaaa,
            ..
        }
    )));
    assert!(provider.records("example.com").iter().all(|r| r.record_type == RecordType::A));
}

#[tokio::test]
async fn every_family_failing_skips_the_provider() {
    let resolver = ScriptedResolver::new();
    resolver.fail(AddressFamily::V4, ResolveError::Timeout { attempts: 6 });
    resolver.fail(AddressFamily::V6, ResolveError::Timeout { attempts: 6 });
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, _events) = engine(&resolver, &provider, &["home.example.com"]);

    let summary = assert_ok!(engine.run_cycle(None).await);

    assert!(summary.changed.is_empty());
    assert!(provider.calls().is_empty());
    assert_eq!(summary.probes.len(), 2);
}

#[tokio::test]
async fn missing_zone_aborts_before_any_mutation() {
    let resolver = ScriptedResolver::v4("198.51.100.7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, _events) = engine(
        &resolver,
        &provider,
        &["home.example.com", "vpn.missing.net", "www.absent.org"],
    );

    let err = assert_err!(engine.run_cycle(None).await);

    match err {
        Error::ZoneNotFound { zones } => {
            assert_eq!(zones, vec!["absent.org".to_string(), "missing.net".to_string()]);
        }
        other => panic!("expected ZoneNotFound, got {other:?}"),
    }
    assert!(provider.mutations().is_empty());
    assert_eq!(provider.calls(), vec![ProviderCall::ListZones]);
}

#[tokio::test]
async fn zone_listing_failure_is_reported_in_the_summary() {
    let resolver = ScriptedResolver::v4("198.51.100.7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    provider.fail_list_zones(true);
    let (engine, mut events) = engine(&resolver, &provider, &["home.example.com"]);

    let summary = assert_ok!(engine.run_cycle(None).await);

    assert!(!summary.is_success());
    assert!(summary.zone_error.as_deref().unwrap_or_default().contains("recording"));
    assert!(provider.mutations().is_empty());
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, EngineEvent::ZoneListingFailed { .. }))
    );
}

#[tokio::test]
async fn cancelled_probes_report_no_change() {
    let resolver = ScriptedResolver::v4("198.51.100.7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, _events) = engine(&resolver, &provider, &["home.example.com"]);

    engine.cancellation_token().cancel();
    let summary = assert_ok!(engine.run_cycle(None).await);

    assert!(summary.changed.is_empty());
    assert!(
        summary
            .probes
            .iter()
            .all(|r| r.outcome == Err(ResolveError::Cancelled))
    );
    assert!(provider.calls().is_empty());
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let resolver = ScriptedResolver::new();
    let provider = RecordingZoneProvider::new();
    let mut config = minimal_config(&["home.example.com"]);
    config.ttl = 0;

    let result = SyncEngine::new(Box::new(resolver), Box::new(provider), config);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn cycle_runs_on_a_spawned_task() {
    let resolver = ScriptedResolver::v4("198.51.100.7");
    let provider = RecordingZoneProvider::new().with_zone("example.com");
    let (engine, _events) = engine(&resolver, &provider, &["home.example.com", "vpn.example.com"]);

    let task = tokio::spawn(async move { engine.run_cycle(None).await });
    let summary = assert_ok!(task.await.unwrap());

    assert!(summary.is_success());
    assert_eq!(summary.mutated(), 2);
    assert_eq!(provider.records("example.com").len(), 2);
}
