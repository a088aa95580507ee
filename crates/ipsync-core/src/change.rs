//! Change detection between two probe cycles

use crate::probe::ProbeSet;
use crate::traits::AddressFamily;

/// Decide which address families need a remote update
///
/// Without a previous set every successfully resolved family counts as
/// changed, so the first cycle always updates. Otherwise a family changed
/// when it resolved now and its address differs from the previous one
/// (including when the previous probe for it failed or was absent).
///
/// Families that failed to resolve now are never reported: a stale address
/// is never overwritten with an unknown one.
pub fn changed_families(previous: Option<&ProbeSet>, current: &ProbeSet) -> Vec<AddressFamily> {
    current
        .successes()
        .filter(|(family, ip)| match previous {
            None => true,
            Some(previous) => previous.ip(*family) != Some(*ip),
        })
        .map(|(family, _)| family)
        .collect()
}
