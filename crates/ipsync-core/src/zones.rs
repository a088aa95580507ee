//! Zone grouping and zone resolution
//!
//! A flat list of domain names is partitioned by registrable zone (the
//! "domain + public suffix" unit a provider manages), then each local zone
//! is matched against the provider's zone list to obtain its identifier.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::RemoteZone;

/// Domains that share one registrable zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneGroup {
    /// Registrable zone name (e.g. "example.co.uk")
    pub zone: String,
    /// Full domain names in the zone, unique, first-seen order
    pub domains: Vec<String>,
}

/// A zone group matched to the provider's zone identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedZone {
    /// Provider-assigned zone identifier
    pub id: String,
    /// The local group this zone serves
    pub group: ZoneGroup,
}

impl ResolvedZone {
    pub fn name(&self) -> &str {
        &self.group.zone
    }

    pub fn domains(&self) -> &[String] {
        &self.group.domains
    }
}

/// Normalise a configured domain name for grouping and record naming
///
/// Trims whitespace, lower-cases and drops a trailing root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Registrable zone of a domain, by public suffix list
///
/// `api.example.co.uk` → `example.co.uk`; `example.com` → `example.com`.
pub fn registrable_zone(domain: &str) -> Result<String> {
    let normalized = normalize_domain(domain);
    if normalized.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    psl::domain_str(&normalized)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::config(format!(
                "Domain '{}' has no registrable zone (is it a bare public suffix?)",
                domain.trim()
            ))
        })
}

/// Partition domains into groups keyed by registrable zone
///
/// Every domain lands in exactly one group. Duplicate domains (after
/// normalisation) are kept once. Groups are ordered by zone name.
pub fn group_domains<S: AsRef<str>>(domains: &[S]) -> Result<Vec<ZoneGroup>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for domain in domains {
        let zone = registrable_zone(domain.as_ref())?;
        let name = normalize_domain(domain.as_ref());
        let members = groups.entry(zone).or_default();
        if !members.contains(&name) {
            members.push(name);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(zone, domains)| ZoneGroup { zone, domains })
        .collect())
}

/// Match local zone groups against the provider's zones
///
/// Matching is by exact zone name (case and trailing dot ignored). If any
/// local zone is missing remotely, fails with [`Error::ZoneNotFound`] naming
/// every missing zone; nothing is returned partially.
pub fn resolve_zones(groups: &[ZoneGroup], remote_zones: &[RemoteZone]) -> Result<Vec<ResolvedZone>> {
    let by_name: BTreeMap<String, &RemoteZone> = remote_zones
        .iter()
        .map(|zone| (normalize_domain(&zone.name), zone))
        .collect();

    let mut resolved = Vec::with_capacity(groups.len());
    let mut missing = Vec::new();

    for group in groups {
        match by_name.get(&normalize_domain(&group.zone)) {
            Some(remote) => {
                debug!("Zone {} resolved to id {}", group.zone, remote.id);
                resolved.push(ResolvedZone {
                    id: remote.id.clone(),
                    group: group.clone(),
                });
            }
            None => missing.push(group.zone.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(Error::zone_not_found(missing));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_registrable_zone() {
        let groups = group_domains(&["a.example.com", "b.example.com", "x.other.org"]).unwrap();

        assert_eq!(
            groups,
            vec![
                ZoneGroup {
                    zone: "example.com".into(),
                    domains: vec!["a.example.com".into(), "b.example.com".into()],
                },
                ZoneGroup {
                    zone: "other.org".into(),
                    domains: vec!["x.other.org".into()],
                },
            ]
        );
    }

    #[test]
    fn multi_label_public_suffixes_are_respected() {
        assert_eq!(registrable_zone("api.example.co.uk").unwrap(), "example.co.uk");
        assert_eq!(registrable_zone("deep.nested.example.com.au").unwrap(), "example.com.au");
    }

    #[test]
    fn apex_and_subdomains_share_a_group() {
        let groups = group_domains(&["example.com", "www.example.com"]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].domains, vec!["example.com", "www.example.com"]);
    }

    #[test]
    fn domains_are_normalised_and_deduplicated() {
        let groups = group_domains(&["WWW.Example.com.", " www.example.com ", "example.com"]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].domains, vec!["www.example.com", "example.com"]);
    }

    #[test]
    fn every_domain_lands_in_exactly_one_group() {
        let domains = ["a.example.com", "b.example.net", "c.example.com", "example.net", "d.e.example.org"];
        let groups = group_domains(&domains).unwrap();

        for domain in domains {
            let owners: Vec<_> = groups.iter().filter(|g| g.domains.iter().any(|d| d == domain)).collect();
            assert_eq!(owners.len(), 1, "{domain} should be in exactly one group");
            let zone = &owners[0].zone;
            assert!(domain == zone || domain.ends_with(&format!(".{zone}")));
        }
    }

    #[test]
    fn bare_suffixes_are_rejected() {
        assert!(matches!(registrable_zone("co.uk"), Err(Error::Config(_))));
        assert!(matches!(registrable_zone(""), Err(Error::Config(_))));
    }

    #[test]
    fn resolves_zone_ids_by_exact_name() {
        let groups = group_domains(&["a.example.com", "x.other.org"]).unwrap();
        let remote = vec![
            RemoteZone::new("z-other", "other.org"),
            RemoteZone::new("z-example", "Example.com"),
            RemoteZone::new("z-unused", "unused.net"),
        ];

        let resolved = resolve_zones(&groups, &remote).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].id, "z-example");
        assert_eq!(resolved[0].name(), "example.com");
        assert_eq!(resolved[1].id, "z-other");
    }

    #[test]
    fn missing_zones_are_all_reported() {
        let groups = group_domains(&["a.example.com", "x.other.org", "y.third.net"]).unwrap();
        let remote = vec![RemoteZone::new("1", "example.com")];

        match resolve_zones(&groups, &remote) {
            Err(Error::ZoneNotFound { zones }) => {
                assert_eq!(zones, vec!["other.org".to_string(), "third.net".to_string()]);
            }
            other => panic!("expected ZoneNotFound, got {other:?}"),
        }
    }
}
