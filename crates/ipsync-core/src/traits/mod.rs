//! Core traits for the ipsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover the caller's public address per family
//! - [`ZoneProvider`]: List zones and create/update address records

pub mod address_resolver;
pub mod zone_provider;

pub use address_resolver::{AddressFamily, AddressResolver, AddressResolverFactory, ResolveOptions};
pub use zone_provider::{
    RecordPayload, RecordType, RemoteRecord, RemoteZone, ZoneProvider, ZoneProviderFactory,
};
