// # ipsync-core
//
// Core library for keeping DNS zones pointed at the host's public address.
//
// ## Architecture Overview
//
// - **AddressResolver**: Trait for discovering the public address per family
// - **ZoneProvider**: Trait for listing zones and writing address records
// - **probe / change**: Probe every family, compare against the previous cycle
// - **zones**: Group domains by registrable zone and match provider zones
// - **reconcile**: Plan and apply record creates/updates with bounded concurrency
// - **SyncEngine**: Fixed-delay loop that drives one cycle after another
// - **ProviderRegistry**: Plugin-based registry for providers and resolvers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Explicit State**: The previous probe results are the only state carried
//    between cycles, and they are passed into each cycle by reference
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library

pub mod change;
pub mod config;
pub mod engine;
pub mod error;
pub mod probe;
pub mod reconcile;
pub mod registry;
pub mod traits;
pub mod zones;

// Re-export core types for convenience
pub use change::changed_families;
pub use config::{EngineConfig, ProbeConfig, ProviderConfig, SyncConfig, parse_interval};
pub use engine::{CycleSummary, EngineEvent, Scheduler, SyncEngine};
pub use error::{Error, ResolveError, Result};
pub use probe::{ProbeResult, ProbeSet, probe_all};
pub use reconcile::{ReconcileLimits, ReconcileReport, Reconciler, RecordAction, plan_records};
pub use registry::ProviderRegistry;
pub use traits::{AddressFamily, AddressResolver, RecordType, ResolveOptions, ZoneProvider};
pub use zones::{ResolvedZone, ZoneGroup, group_domains, resolve_zones};
