//! Licence resolution for libraries.
//!
//! - [`spdx`] parses licence expressions and normalizes common non-SPDX names.
//! - [`risk`] derives library risk from the licences a library publishes.
//!
//! Identifiers resolve against stored licences by short or SPDX identifier,
//! ignoring case.

pub mod risk;
pub mod spdx;

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::models::{Library, LicenseId, LinkedLicense};
use crate::store::Graph;

use spdx::Expr;

/// Short identifier of the catch-all licence used for unresolved identifiers.
pub const UNKNOWN_LICENSE: &str = "Unknown";

/// Find the stored licence named by `identifier`.
pub fn resolve(graph: &Graph, identifier: &str) -> Option<LicenseId> {
    let normalized = spdx::normalize(identifier);
    graph
        .licenses()
        .find(|l| l.is_named(&normalized) || l.is_named(identifier))
        .and_then(|l| l.id)
}

fn resolve_or_unknown(graph: &Graph, identifier: &str) -> Option<LicenseId> {
    let resolved = resolve(graph, identifier)
        .or_else(|| graph.license_by_short_identifier(UNKNOWN_LICENSE).and_then(|l| l.id));
    if resolved.is_none() {
        warn!("License '{identifier}' is not known and was skipped");
    }
    resolved
}

/// Ordered linked licences for a raw licence expression.
///
/// Identifiers that resolve to nothing map to the `Unknown` licence when one
/// is stored and are dropped otherwise.
pub fn link_licenses(graph: &Graph, expression: &str) -> Vec<LinkedLicense> {
    let mut linked: Vec<LinkedLicense> = spdx::linked_identifiers(expression)
        .into_iter()
        .filter_map(|(id, link)| {
            resolve_or_unknown(graph, &id).map(|license| LinkedLicense { license, link })
        })
        .collect();
    if let Some(last) = linked.last_mut() {
        last.link = None;
    }
    linked
}

/// Licences to publish for a raw expression.
///
/// Every AND member is published; of OR alternatives the one with the lowest
/// risk wins, the first one on ties.
pub fn licenses_to_publish(graph: &Graph, expression: &str) -> BTreeSet<LicenseId> {
    spdx::parse(expression)
        .map(|expr| publish(graph, &expr))
        .unwrap_or_default()
}

fn publish(graph: &Graph, expr: &Expr) -> BTreeSet<LicenseId> {
    match expr {
        Expr::License { id, .. } => resolve_or_unknown(graph, id).into_iter().collect(),
        Expr::And(parts) => parts.iter().flat_map(|p| publish(graph, p)).collect(),
        Expr::Or(parts) => {
            let mut best: Option<(i32, BTreeSet<LicenseId>)> = None;
            for candidate in parts.iter().map(|p| publish(graph, p)) {
                if candidate.is_empty() {
                    continue;
                }
                let level = risk::highest_level(graph, &candidate);
                match &best {
                    Some((best_level, _)) if *best_level <= level => {}
                    _ => best = Some((level, candidate)),
                }
            }
            best.map(|(_, set)| set).unwrap_or_default()
        }
    }
}

/// Fill in derived licence fields of `library` from its original licence.
///
/// Links the original expression when no linked licences exist, derives the
/// licences to publish when none are set, and recomputes the library risk.
pub fn autocomplete(graph: &Graph, library: &mut Library) {
    debug!("Autocomplete of license fields for {library}");
    let original = library.original_license.clone().unwrap_or_default();

    if library.licenses.is_empty() && !original.trim().is_empty() {
        library.licenses = link_licenses(graph, &original);
    }
    if library.license_to_publish.is_empty() && !library.licenses.is_empty() {
        library.license_to_publish = if original.trim().is_empty() {
            library.licenses.iter().map(|l| l.license).collect()
        } else {
            licenses_to_publish(graph, &original)
        };
    }
    library.library_risk = risk::library_risk(graph, library);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{License, LicenseRisk, LibraryType, LinkType};

    struct Fixture {
        graph: Graph,
        mit: LicenseId,
        gpl: LicenseId,
        apache: LicenseId,
    }

    fn fixture() -> Fixture {
        let mut graph = Graph::default();
        let low = graph.create_risk(LicenseRisk::new("Permissive", 1)).unwrap();
        let high = graph.create_risk(LicenseRisk::new("Strong copyleft", 3)).unwrap();
        let mit = graph
            .create_license(License::new("MIT", "MIT License").with_risk(low))
            .unwrap();
        let gpl = graph
            .create_license(
                License::new("GPL-3.0", "GNU GPL v3")
                    .with_spdx("GPL-3.0-only")
                    .with_risk(high),
            )
            .unwrap();
        let apache = graph
            .create_license(
                License::new("Apache2", "Apache License 2.0")
                    .with_spdx("Apache-2.0")
                    .with_risk(low),
            )
            .unwrap();
        Fixture {
            graph,
            mit,
            gpl,
            apache,
        }
    }

    #[test]
    fn resolves_by_short_spdx_or_common_name() {
        let f = fixture();
        assert_eq!(resolve(&f.graph, "mit"), Some(f.mit));
        assert_eq!(resolve(&f.graph, "gpl-3.0-only"), Some(f.gpl));
        assert_eq!(resolve(&f.graph, "Apache License 2.0"), Some(f.apache));
        assert_eq!(resolve(&f.graph, "WTFPL"), None);
    }

    #[test]
    fn links_follow_reading_order() {
        let f = fixture();
        let linked = link_licenses(&f.graph, "GPL-3.0 OR MIT AND Apache-2.0");
        assert_eq!(
            linked,
            vec![
                LinkedLicense {
                    license: f.gpl,
                    link: Some(LinkType::Or)
                },
                LinkedLicense {
                    license: f.mit,
                    link: Some(LinkType::And)
                },
                LinkedLicense {
                    license: f.apache,
                    link: None
                },
            ]
        );
    }

    #[test]
    fn or_publishes_lowest_risk_alternative() {
        let f = fixture();
        assert_eq!(
            licenses_to_publish(&f.graph, "GPL-3.0 OR MIT"),
            BTreeSet::from([f.mit])
        );
        assert_eq!(
            licenses_to_publish(&f.graph, "MIT OR Apache-2.0"),
            BTreeSet::from([f.mit])
        );
        assert_eq!(
            licenses_to_publish(&f.graph, "(GPL-3.0 OR MIT) AND Apache-2.0"),
            BTreeSet::from([f.mit, f.apache])
        );
    }

    #[test]
    fn unresolved_identifiers_map_to_unknown_when_stored() {
        let mut f = fixture();
        assert!(link_licenses(&f.graph, "Custom-1.0").is_empty());
        let unknown = f
            .graph
            .create_license(License::new(UNKNOWN_LICENSE, "Unknown license"))
            .unwrap();
        assert_eq!(
            link_licenses(&f.graph, "Custom-1.0"),
            vec![LinkedLicense {
                license: unknown,
                link: None
            }]
        );
    }

    #[test]
    fn autocomplete_derives_links_publish_and_risk() {
        let f = fixture();
        let mut library =
            Library::new(LibraryType::Npm, "", "dual", "1.0.0").with_original_license("MIT OR GPL-3.0");
        autocomplete(&f.graph, &mut library);
        assert_eq!(library.licenses.len(), 2);
        assert_eq!(library.license_to_publish, BTreeSet::from([f.mit]));
        assert_eq!(
            library.library_risk,
            f.graph.license(f.mit).unwrap().license_risk
        );
    }

    #[test]
    fn autocomplete_keeps_curated_publish_set() {
        let f = fixture();
        let mut library =
            Library::new(LibraryType::Npm, "", "dual", "1.0.0").with_original_license("MIT OR GPL-3.0");
        library.license_to_publish.insert(f.gpl);
        autocomplete(&f.graph, &mut library);
        assert_eq!(library.license_to_publish, BTreeSet::from([f.gpl]));
        assert_eq!(
            library.library_risk,
            f.graph.license(f.gpl).unwrap().license_risk
        );
    }
}
