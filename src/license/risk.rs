use std::collections::BTreeSet;

use log::debug;

use crate::models::{Library, LicenseId, LicenseRisk, RiskId};
use crate::store::Graph;

/// Risk attached to a licence, if both exist.
pub fn license_risk(graph: &Graph, license: LicenseId) -> Option<&LicenseRisk> {
    graph
        .license(license)
        .and_then(|l| l.license_risk)
        .and_then(|r| graph.risk(r))
}

/// Highest risk level among `licenses`.
///
/// A licence without a risk counts as the most severe level.
pub fn highest_level(graph: &Graph, licenses: &BTreeSet<LicenseId>) -> i32 {
    licenses
        .iter()
        .map(|id| license_risk(graph, *id).map_or(i32::MAX, |r| r.level))
        .max()
        .unwrap_or(i32::MAX)
}

/// The highest-level risk among the licences `library` publishes.
pub fn library_risk(graph: &Graph, library: &Library) -> Option<RiskId> {
    let risk = library
        .license_to_publish
        .iter()
        .filter_map(|id| license_risk(graph, *id))
        .max_by_key(|r| r.level)
        .and_then(|r| r.id);
    debug!("Calculated library risk for {library} : {risk:?}");
    risk
}
