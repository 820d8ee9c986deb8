//! Per-project dependency aggregation.
//!
//! Read operations take a [`Graph`] and return owned values; a project id
//! that does not exist yields empty results. Mutations go through
//! [`Store::transaction`] and either apply fully or not at all.

pub mod difference;
pub mod statistics;

use std::collections::{BTreeMap, BTreeSet};

use chrono::Local;
use log::{debug, info};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Dependency, Library, LibraryId, License, LicenseId, Project, ProjectId, UploadState};
use crate::store::{Graph, Store};

pub use difference::{compare, DifferenceView};
pub use statistics::{overview, project_risk, ProjectOverview, RiskCount};

fn library_ids(graph: &Graph, project: ProjectId) -> BTreeSet<LibraryId> {
    graph
        .project(project)
        .map(|p| p.dependencies.iter().map(|d| d.library).collect())
        .unwrap_or_default()
}

fn sorted_libraries(graph: &Graph, ids: impl IntoIterator<Item = LibraryId>) -> Vec<Library> {
    let mut libraries: Vec<Library> = ids
        .into_iter()
        .filter_map(|id| graph.library(id).cloned())
        .collect();
    libraries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    libraries
}

/// Distinct libraries used by `project`, ordered by name.
pub fn libraries_of(graph: &Graph, project: ProjectId) -> Vec<Library> {
    sorted_libraries(graph, library_ids(graph, project))
}

/// Libraries of `first` that `second` does not use.
pub fn only_in_first(graph: &Graph, first: ProjectId, second: ProjectId) -> Vec<Library> {
    let others = library_ids(graph, second);
    sorted_libraries(
        graph,
        library_ids(graph, first)
            .into_iter()
            .filter(|id| !others.contains(id)),
    )
}

/// Libraries used by both projects.
pub fn intersection(graph: &Graph, first: ProjectId, second: ProjectId) -> Vec<Library> {
    let others = library_ids(graph, second);
    sorted_libraries(
        graph,
        library_ids(graph, first)
            .into_iter()
            .filter(|id| others.contains(id)),
    )
}

/// Occurrences of one licence across a project's publish sets.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseCount {
    pub license: License,
    pub count: usize,
}

/// How often each licence is published across the project's dependencies.
///
/// Sorted by count descending, then short identifier ascending.
pub fn license_distribution(graph: &Graph, project: ProjectId) -> Vec<LicenseCount> {
    let mut counts: BTreeMap<LicenseId, usize> = BTreeMap::new();
    let Some(project) = graph.project(project) else {
        return Vec::new();
    };
    for dependency in &project.dependencies {
        if let Some(library) = graph.library(dependency.library) {
            for license in &library.license_to_publish {
                *counts.entry(*license).or_default() += 1;
            }
        }
    }
    let mut distribution: Vec<LicenseCount> = counts
        .into_iter()
        .filter_map(|(id, count)| {
            graph.license(id).map(|license| LicenseCount {
                license: license.clone(),
                count,
            })
        })
        .collect();
    distribution.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.license.short_identifier.cmp(&b.license.short_identifier))
    });
    distribution
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewCompleteness {
    pub total: usize,
    pub reviewed: usize,
}

impl ReviewCompleteness {
    pub fn is_complete(&self) -> bool {
        self.total == self.reviewed
    }
}

pub fn review_completeness(graph: &Graph, project: ProjectId) -> ReviewCompleteness {
    let libraries = libraries_of(graph, project);
    ReviewCompleteness {
        total: libraries.len(),
        reviewed: libraries.iter().filter(|l| l.reviewed).count(),
    }
}

pub fn manually_added_dependencies(graph: &Graph, project: ProjectId) -> Vec<Dependency> {
    graph
        .project(project)
        .map(|p| {
            p.dependencies
                .iter()
                .filter(|d| d.added_manually)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Delete the dependencies of `project`, keeping the manual ones if asked.
///
/// Returns the number of removed dependencies; a missing project removes nothing.
pub fn purge_dependencies(store: &Store, project: ProjectId, keep_manual: bool) -> Result<usize> {
    let removed = store.transaction(|graph| {
        let Some(project) = graph.project_mut(project) else {
            return Ok(0);
        };
        let before = project.dependencies.len();
        project
            .dependencies
            .retain(|d| keep_manual && d.added_manually);
        Ok(before - project.dependencies.len())
    })?;
    info!("Purged {removed} dependencies of project {project} (keep manual: {keep_manual})");
    Ok(removed)
}

/// Attach `libraries` to `project` as manually added dependencies.
///
/// Libraries the project already uses are skipped. Returns how many were added.
pub fn add_libraries(store: &Store, project: ProjectId, libraries: &[LibraryId]) -> Result<usize> {
    store.transaction(|graph| {
        if graph.project(project).is_none() {
            return Err(Error::not_found("project", project));
        }
        let mut added = 0;
        for library in libraries {
            if graph.project(project).is_some_and(|p| p.has_library(*library)) {
                debug!("Library [ {library} ] is already in Project [ {project} ]");
                continue;
            }
            graph.add_dependency(project, Dependency::manual(*library))?;
            added += 1;
        }
        if added > 0 {
            if let Some(p) = graph.project_mut(project) {
                p.last_updated_date = Some(Local::now().date_naive());
            }
        }
        Ok(added)
    })
}

/// Create `version` as the successor of `base`.
///
/// `base` is saved with `delivered` as given; the new project starts
/// undelivered, points back at `base` and, when `copy_manual` is set, receives
/// the manually added dependencies of `base`.
pub fn create_next_version(
    store: &Store,
    base: ProjectId,
    version: &str,
    delivered: bool,
    copy_manual: bool,
) -> Result<ProjectId> {
    store.transaction(|graph| {
        let mut previous = graph
            .project(base)
            .cloned()
            .ok_or_else(|| Error::not_found("project", base))?;
        previous.delivered = delivered;
        graph.update_project(previous.clone())?;

        let next = Project {
            id: None,
            upload_state: UploadState::Ok,
            version: version.to_string(),
            previous_project: Some(base),
            delivered: false,
            delivered_date: None,
            last_updated_date: None,
            created_date: Some(Local::now().date_naive()),
            dependencies: Vec::new(),
            ..previous.clone()
        };
        let id = graph.create_project(next)?;

        if copy_manual {
            for dependency in previous.dependencies.iter().filter(|d| d.added_manually) {
                graph.add_dependency(id, Dependency::manual(dependency.library))?;
            }
        }
        info!("Created next version {} of project {}", version, previous);
        Ok(id)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::LibraryType;

    pub(crate) struct Fixture {
        pub store: Store,
        pub app: ProjectId,
        pub next: ProjectId,
        pub mit: LicenseId,
        pub apache: LicenseId,
        pub libs: Vec<LibraryId>,
    }

    /// Two projects sharing `b`, `a` only in app, `c` only in next.
    pub(crate) fn fixture() -> Fixture {
        let mut graph = Graph::default();
        let mit = graph.create_license(License::new("MIT", "MIT License")).unwrap();
        let apache = graph
            .create_license(License::new("Apache-2.0", "Apache License 2.0"))
            .unwrap();

        let mut libs = Vec::new();
        for (name, publish, reviewed) in [
            ("b", vec![mit], true),
            ("a", vec![mit, apache], false),
            ("c", vec![apache], true),
        ] {
            let mut library = Library::new(LibraryType::Npm, "", name, "1.0.0");
            library.license_to_publish = publish.into_iter().collect();
            library.reviewed = reviewed;
            libs.push(graph.create_library(library).unwrap());
        }

        let app = graph.create_project(Project::new("App", "app", "1.0")).unwrap();
        let next = graph.create_project(Project::new("App", "app", "2.0")).unwrap();
        graph.add_dependency(app, Dependency::new(libs[0])).unwrap();
        graph.add_dependency(app, Dependency::manual(libs[1])).unwrap();
        graph.add_dependency(next, Dependency::new(libs[0])).unwrap();
        graph.add_dependency(next, Dependency::new(libs[2])).unwrap();

        Fixture {
            store: Store::new(graph),
            app,
            next,
            mit,
            apache,
            libs,
        }
    }

    fn names(libraries: &[Library]) -> Vec<&str> {
        libraries.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn libraries_are_ordered_by_name() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        assert_eq!(names(&libraries_of(&graph, f.app)), vec!["a", "b"]);
        assert!(libraries_of(&graph, ProjectId(999)).is_empty());
    }

    #[test]
    fn only_in_first_and_intersection_partition_the_first_project() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        let only = only_in_first(&graph, f.app, f.next);
        let both = intersection(&graph, f.app, f.next);
        assert_eq!(names(&only), vec!["a"]);
        assert_eq!(names(&both), vec!["b"]);

        let mut union: Vec<LibraryId> = only.iter().chain(both.iter()).filter_map(|l| l.id).collect();
        union.sort();
        let mut all: Vec<LibraryId> = libraries_of(&graph, f.app).iter().filter_map(|l| l.id).collect();
        all.sort();
        assert_eq!(union, all);
        assert!(only.iter().all(|l| !both.contains(l)));
    }

    #[test]
    fn distribution_counts_sum_to_dependency_license_pairs() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        let distribution = license_distribution(&graph, f.app);
        let counts: Vec<(&str, usize)> = distribution
            .iter()
            .map(|c| (c.license.short_identifier.as_str(), c.count))
            .collect();
        assert_eq!(counts, vec![("MIT", 2), ("Apache-2.0", 1)]);

        let pairs: usize = libraries_of(&graph, f.app)
            .iter()
            .map(|l| l.license_to_publish.len())
            .sum();
        assert_eq!(distribution.iter().map(|c| c.count).sum::<usize>(), pairs);

        let again: Vec<usize> = license_distribution(&graph, f.app).iter().map(|c| c.count).collect();
        assert_eq!(again, vec![2, 1]);
    }

    #[test]
    fn distribution_ties_break_on_short_identifier() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        let ids: Vec<LicenseId> = license_distribution(&graph, f.next)
            .iter()
            .filter_map(|c| c.license.id)
            .collect();
        assert_eq!(ids, vec![f.apache, f.mit]);
    }

    #[test]
    fn completeness_counts_reviewed_libraries() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        assert_eq!(
            review_completeness(&graph, f.app),
            ReviewCompleteness {
                total: 2,
                reviewed: 1
            }
        );
        assert!(review_completeness(&graph, f.next).is_complete());
    }

    #[test]
    fn purge_keeping_manual_retains_exactly_the_manual_subset() {
        let f = fixture();
        let manual = manually_added_dependencies(&f.store.read().unwrap(), f.app);
        assert_eq!(manual.len(), 1);

        assert_eq!(purge_dependencies(&f.store, f.app, true).unwrap(), 1);
        let graph = f.store.read().unwrap();
        let remaining = &graph.project(f.app).unwrap().dependencies;
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|d| d.added_manually));
        assert_eq!(remaining[0].id, manual[0].id);
    }

    #[test]
    fn purge_everything_and_missing_project() {
        let f = fixture();
        assert_eq!(purge_dependencies(&f.store, f.next, false).unwrap(), 2);
        assert_eq!(purge_dependencies(&f.store, ProjectId(999), false).unwrap(), 0);
        let graph = f.store.read().unwrap();
        assert!(graph.project(f.next).unwrap().dependencies.is_empty());
        assert!(graph.library(f.libs[2]).is_some());
    }

    #[test]
    fn add_libraries_skips_present_ones() {
        let f = fixture();
        let added = add_libraries(&f.store, f.app, &[f.libs[0], f.libs[2]]).unwrap();
        assert_eq!(added, 1);
        let graph = f.store.read().unwrap();
        let project = graph.project(f.app).unwrap();
        assert!(project.has_library(f.libs[2]));
        assert!(project.last_updated_date.is_some());
        assert_eq!(manually_added_dependencies(&graph, f.app).len(), 2);
    }

    #[test]
    fn add_libraries_is_all_or_nothing() {
        let f = fixture();
        let result = add_libraries(&f.store, f.app, &[f.libs[2], LibraryId(999)]);
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(!f.store.read().unwrap().project(f.app).unwrap().has_library(f.libs[2]));
    }

    #[test]
    fn next_version_links_back_and_copies_manual_dependencies() {
        let f = fixture();
        let id = create_next_version(&f.store, f.app, "1.1", true, true).unwrap();
        let graph = f.store.read().unwrap();
        let base = graph.project(f.app).unwrap();
        assert!(base.delivered);
        assert!(base.delivered_date.is_some());

        let next = graph.project(id).unwrap();
        assert_eq!(next.label, "app");
        assert_eq!(next.version, "1.1");
        assert_eq!(next.previous_project, Some(f.app));
        assert!(!next.delivered);
        assert_eq!(next.dependencies.len(), 1);
        assert!(next.has_library(f.libs[1]));
        assert!(next.dependencies[0].added_manually);
    }

    #[test]
    fn next_version_rejects_existing_key() {
        let f = fixture();
        let result = create_next_version(&f.store, f.app, "2.0", true, false);
        assert!(matches!(result, Err(Error::Duplicate { .. })));
        assert!(!f.store.read().unwrap().project(f.app).unwrap().delivered);
    }
}
