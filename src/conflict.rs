//! Curated licence compatibility matrix.
//!
//! Conflicts are stored directionally (first → second). Nothing here infers
//! compatibility: a pair without a row is [`CompatibilityState::Unknown`].

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::{debug, info};

use crate::error::Result;
use crate::models::{CompatibilityState, Library, LicenseConflict, LicenseId, LogSeverity};
use crate::store::{Graph, Store};

pub const CONFLICT_ISSUE: &str = "License Conflict";

/// Read-only view of the conflict table of a graph.
pub struct ConflictMatrix<'g> {
    graph: &'g Graph,
}

impl<'g> ConflictMatrix<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    fn row(&self, first: LicenseId, second: LicenseId) -> Option<&'g LicenseConflict> {
        self.graph
            .conflicts()
            .find(|c| c.first == first && c.second == second)
    }

    /// State declared for the ordered pair, `Unknown` when nothing is declared.
    pub fn compatibility(&self, first: LicenseId, second: LicenseId) -> CompatibilityState {
        self.row(first, second)
            .map_or(CompatibilityState::Unknown, |c| c.compatibility)
    }

    /// Outgoing conflicts of `license`, ordered by the second licence's short identifier.
    pub fn conflicts_for_license(&self, license: LicenseId) -> Vec<LicenseConflict> {
        let mut conflicts: Vec<LicenseConflict> = self
            .graph
            .conflicts()
            .filter(|c| c.first == license)
            .cloned()
            .collect();
        conflicts.sort_by(|a, b| self.compare(a, b));
        conflicts
    }

    pub fn incompatible_conflicts_for_license(&self, license: LicenseId) -> Vec<LicenseConflict> {
        self.conflicts_for_license(license)
            .into_iter()
            .filter(|c| c.compatibility == CompatibilityState::Incompatible)
            .collect()
    }

    /// True only for an explicit INCOMPATIBLE row for exactly (`first`, `second`).
    pub fn is_incompatible_pair(&self, first: LicenseId, second: LicenseId) -> bool {
        self.compatibility(first, second) == CompatibilityState::Incompatible
    }

    /// Probe both orientations of the pair.
    pub fn is_incompatible_either_way(&self, a: LicenseId, b: LicenseId) -> bool {
        self.is_incompatible_pair(a, b) || self.is_incompatible_pair(b, a)
    }

    /// Whether any two licences of `licenses` have an incompatible row in either direction.
    pub fn any_incompatible(&self, licenses: &[LicenseId]) -> bool {
        licenses.iter().enumerate().any(|(i, a)| {
            licenses[i + 1..]
                .iter()
                .any(|b| self.is_incompatible_either_way(*a, *b))
        })
    }

    fn short_identifier(&self, license: LicenseId) -> Option<&'g str> {
        self.graph
            .license(license)
            .map(|l| l.short_identifier.as_str())
    }

    fn compare(&self, a: &LicenseConflict, b: &LicenseConflict) -> Ordering {
        compare_short_identifiers(self.short_identifier(a.second), self.short_identifier(b.second))
    }

    /// Append a "License Conflict" entry to `library` for every incompatible pair
    /// among its licences.
    ///
    /// Publish licences are checked among themselves, then file licences, then
    /// the union of both. Returns the number of entries added.
    pub fn cross_check(&self, library: &mut Library) -> usize {
        debug!("Check if license combinations are incompatible for : {library}");
        let publish: Vec<LicenseId> = library.license_to_publish.iter().copied().collect();
        let files: Vec<LicenseId> = library.license_of_files.iter().copied().collect();

        let mut added = 0;
        if publish.len() > 1 {
            added += self.cross_check_set(library, &publish);
        }
        if files.len() > 1 {
            added += self.cross_check_set(library, &files);
        }
        if !publish.is_empty() && !files.is_empty() {
            let merged: Vec<LicenseId> = publish
                .iter()
                .chain(files.iter())
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            added += self.cross_check_set(library, &merged);
        }
        added
    }

    fn cross_check_set(&self, library: &mut Library, licenses: &[LicenseId]) -> usize {
        let mut added = 0;
        for first in licenses {
            for second in licenses {
                if !self.is_incompatible_either_way(*first, *second) {
                    continue;
                }
                let message = format!(
                    "License {} is incompatible with license {}.",
                    self.short_identifier(*first).unwrap_or_default(),
                    self.short_identifier(*second).unwrap_or_default()
                );
                if library.add_error_log(CONFLICT_ISSUE, message, LogSeverity::High) {
                    added += 1;
                }
            }
        }
        added
    }
}

/// Case-sensitive ascending order; a missing identifier sorts first.
pub fn compare_short_identifiers(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Remove every conflict naming `license` in either position, in one transaction.
pub fn delete_conflicts_for_license(store: &Store, license: LicenseId) -> Result<usize> {
    let removed = store.transaction(|graph| Ok(graph.delete_conflicts_for_license(license)))?;
    info!("Deleted {removed} conflicts of license {license}");
    Ok(removed)
}
