//! Report assembly and rendering.
//!
//! [`ProjectReport`] and [`ConflictReport`] gather what the CLI shows about a
//! project or a licence; they serialize as-is for `--format json`.
//! [`terminal`] renders them, and query results, as colored tables.

pub mod terminal;

use serde::Serialize;

use crate::conflict::ConflictMatrix;
use crate::dependency::{
    self, license_distribution, overview, project_risk, review_completeness, LicenseCount,
    ProjectOverview, ReviewCompleteness, RiskCount,
};
use crate::error::{Error, Result};
use crate::models::{CompatibilityState, License, LicenseId, Project, ProjectId};
use crate::store::Graph;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub project: Project,
    pub overview: ProjectOverview,
    pub completeness: ReviewCompleteness,
    pub distribution: Vec<LicenseCount>,
    pub risks: Vec<RiskCount>,
    pub manual_dependencies: usize,
}

impl ProjectReport {
    pub fn build(graph: &Graph, id: ProjectId) -> Result<Self> {
        let project = graph
            .project(id)
            .cloned()
            .ok_or_else(|| Error::not_found("project", id))?;
        Ok(Self {
            overview: overview(graph, id),
            completeness: review_completeness(graph, id),
            distribution: license_distribution(graph, id),
            risks: project_risk(graph, id),
            manual_dependencies: dependency::manually_added_dependencies(graph, id).len(),
            project,
        })
    }
}

/// One row of a licence's conflict list, with the other licence resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub second: Option<License>,
    pub compatibility: CompatibilityState,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub license: License,
    pub conflicts: Vec<ConflictEntry>,
}

impl ConflictReport {
    pub fn build(graph: &Graph, id: LicenseId, incompatible_only: bool) -> Result<Self> {
        let license = graph
            .license(id)
            .cloned()
            .ok_or_else(|| Error::not_found("license", id))?;
        let matrix = ConflictMatrix::new(graph);
        let conflicts = if incompatible_only {
            matrix.incompatible_conflicts_for_license(id)
        } else {
            matrix.conflicts_for_license(id)
        };
        Ok(Self {
            license,
            conflicts: conflicts
                .into_iter()
                .map(|c| ConflictEntry {
                    second: graph.license(c.second).cloned(),
                    compatibility: c.compatibility,
                    comment: c.comment,
                })
                .collect(),
        })
    }
}
