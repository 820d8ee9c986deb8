use serde::Serialize;

use crate::license::risk;
use crate::models::{LicenseRisk, ProjectId};
use crate::store::Graph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectOverview {
    pub libraries: usize,
    pub libraries_previous: usize,
    pub licenses: usize,
    pub licenses_previous: usize,
    pub reviewed_libraries: usize,
}

/// Library and licence totals of `project` next to those of its previous version.
pub fn overview(graph: &Graph, project: ProjectId) -> ProjectOverview {
    let count = |id: ProjectId| {
        (
            super::libraries_of(graph, id).len(),
            super::license_distribution(graph, id).len(),
        )
    };
    let (libraries, licenses) = count(project);
    let (libraries_previous, licenses_previous) = graph
        .project(project)
        .and_then(|p| p.previous_project)
        .map_or((0, 0), count);

    ProjectOverview {
        libraries,
        libraries_previous,
        licenses,
        licenses_previous,
        reviewed_libraries: super::review_completeness(graph, project).reviewed,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskCount {
    pub risk: LicenseRisk,
    pub count: usize,
}

/// Number of the project's libraries at each risk level, ascending by level.
///
/// Every stored risk is listed, with zero when no library has it.
pub fn project_risk(graph: &Graph, project: ProjectId) -> Vec<RiskCount> {
    let risks: Vec<_> = super::libraries_of(graph, project)
        .iter()
        .map(|library| risk::library_risk(graph, library))
        .collect();
    graph
        .risks()
        .into_iter()
        .map(|r| RiskCount {
            risk: r.clone(),
            count: risks.iter().filter(|id| **id == r.id).count(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Library, LibraryType, License, Project};

    #[test]
    fn overview_without_previous_version_reports_zero() {
        let mut graph = Graph::default();
        let mit = graph.create_license(License::new("MIT", "MIT License")).unwrap();
        let mut library = Library::new(LibraryType::Npm, "", "left-pad", "1.3.0");
        library.license_to_publish.insert(mit);
        library.reviewed = true;
        let lib = graph.create_library(library).unwrap();
        let v1 = graph.create_project(Project::new("App", "app", "1.0")).unwrap();
        graph.add_dependency(v1, Dependency::new(lib)).unwrap();

        assert_eq!(
            overview(&graph, v1),
            ProjectOverview {
                libraries: 1,
                licenses: 1,
                reviewed_libraries: 1,
                ..Default::default()
            }
        );

        let mut next = Project::new("App", "app", "2.0");
        next.previous_project = Some(v1);
        let v2 = graph.create_project(next).unwrap();
        let summary = overview(&graph, v2);
        assert_eq!(summary.libraries, 0);
        assert_eq!(summary.libraries_previous, 1);
        assert_eq!(summary.licenses_previous, 1);
    }

    #[test]
    fn risk_counts_are_listed_by_ascending_level() {
        let mut graph = Graph::default();
        let high = graph.create_risk(LicenseRisk::new("High", 3)).unwrap();
        let low = graph.create_risk(LicenseRisk::new("Low", 1)).unwrap();
        let mit = graph
            .create_license(License::new("MIT", "MIT License").with_risk(low))
            .unwrap();
        let project = graph.create_project(Project::new("App", "app", "1.0")).unwrap();
        for name in ["a", "b"] {
            let mut library = Library::new(LibraryType::Npm, "", name, "1.0.0");
            library.license_to_publish.insert(mit);
            let id = graph.create_library(library).unwrap();
            graph.add_dependency(project, Dependency::new(id)).unwrap();
        }
        let bare = graph
            .create_library(Library::new(LibraryType::Npm, "", "c", "1.0.0"))
            .unwrap();
        graph.add_dependency(project, Dependency::new(bare)).unwrap();

        let counts: Vec<(Option<_>, usize)> = project_risk(&graph, project)
            .iter()
            .map(|c| (c.risk.id, c.count))
            .collect();
        assert_eq!(counts, vec![(Some(low), 2), (Some(high), 0)]);
    }
}
