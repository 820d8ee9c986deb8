use serde::Serialize;

use crate::models::{Library, ProjectId};
use crate::store::Graph;

/// Library-level comparison of two project versions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DifferenceView {
    /// Used by both projects.
    pub same: Vec<Library>,
    /// Only used by the first project.
    pub added: Vec<Library>,
    /// Only used by the second project.
    pub removed: Vec<Library>,
    /// Added libraries with no version of the same artifact in the second project.
    pub first_new: Vec<Library>,
    /// Removed libraries with no version of the same artifact in the first project.
    pub second_new: Vec<Library>,
}

fn new_artifacts(candidates: &[Library], other: &[Library]) -> Vec<Library> {
    candidates
        .iter()
        .filter(|c| !other.iter().any(|o| c.same_artifact(o)))
        .cloned()
        .collect()
}

pub fn compare(graph: &Graph, first: ProjectId, second: ProjectId) -> DifferenceView {
    let added = super::only_in_first(graph, first, second);
    let removed = super::only_in_first(graph, second, first);
    let first_libraries = super::libraries_of(graph, first);
    let second_libraries = super::libraries_of(graph, second);

    DifferenceView {
        same: super::intersection(graph, first, second),
        first_new: new_artifacts(&added, &second_libraries),
        second_new: new_artifacts(&removed, &first_libraries),
        added,
        removed,
    }
}
