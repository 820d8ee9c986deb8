use std::collections::BTreeMap;

use chrono::{Local, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    is_blank, Dependency, DependencyId, Library, LibraryId, License, LicenseConflict, LicenseId,
    LicenseRisk, Project, ProjectId, RiskId, ConflictId,
};

/// All persisted entities plus the id sequence.
///
/// Every mutating method validates before it writes, so a failed call leaves
/// the graph untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    sequence: u64,
    #[serde(default)]
    pub(crate) licenses: BTreeMap<LicenseId, License>,
    #[serde(default)]
    pub(crate) conflicts: BTreeMap<ConflictId, LicenseConflict>,
    #[serde(default)]
    pub(crate) risks: BTreeMap<RiskId, LicenseRisk>,
    #[serde(default)]
    pub(crate) libraries: BTreeMap<LibraryId, Library>,
    #[serde(default)]
    pub(crate) projects: BTreeMap<ProjectId, Project>,
}

impl Graph {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    // ── Licenses ────────────────────────────────────────────────────────────

    pub fn licenses(&self) -> impl Iterator<Item = &License> {
        self.licenses.values()
    }

    pub fn license(&self, id: LicenseId) -> Option<&License> {
        self.licenses.get(&id)
    }

    pub fn license_by_short_identifier(&self, short_identifier: &str) -> Option<&License> {
        let wanted = short_identifier.to_lowercase();
        self.licenses
            .values()
            .find(|l| l.short_identifier.to_lowercase() == wanted)
    }

    pub fn create_license(&mut self, mut license: License) -> Result<LicenseId> {
        if license.short_identifier.trim().is_empty() {
            return Err(Error::invalid("license", "short identifier is blank"));
        }
        if self
            .license_by_short_identifier(&license.short_identifier)
            .is_some()
        {
            return Err(Error::duplicate("license", &license.short_identifier));
        }
        self.check_risk(license.license_risk)?;
        let id = LicenseId(self.next_id());
        license.id = Some(id);
        debug!("Created License : {} ({})", license.short_identifier, id);
        self.licenses.insert(id, license);
        Ok(id)
    }

    pub fn update_license(&mut self, license: License) -> Result<()> {
        let id = license
            .id
            .ok_or_else(|| Error::invalid("license", "license has no id"))?;
        if !self.licenses.contains_key(&id) {
            return Err(Error::not_found("license", id));
        }
        if let Some(other) = self.license_by_short_identifier(&license.short_identifier) {
            if other.id != Some(id) {
                return Err(Error::duplicate("license", &license.short_identifier));
            }
        }
        self.check_risk(license.license_risk)?;
        self.licenses.insert(id, license);
        Ok(())
    }

    /// Remove a licence and every conflict that names it.
    ///
    /// Refused while a library still references the licence.
    pub fn delete_license(&mut self, id: LicenseId) -> Result<Option<License>> {
        if !self.licenses.contains_key(&id) {
            return Ok(None);
        }
        if let Some(library) = self
            .libraries
            .values()
            .find(|l| l.referenced_licenses().contains(&id))
        {
            return Err(Error::StillReferenced {
                entity: "license",
                key: id.to_string(),
                by: format!("library {library}"),
            });
        }
        let removed = self.delete_conflicts_for_license(id);
        debug!("Deleted License : {} with {} conflicts", id, removed);
        Ok(self.licenses.remove(&id))
    }

    // ── Conflicts ───────────────────────────────────────────────────────────

    pub fn conflicts(&self) -> impl Iterator<Item = &LicenseConflict> {
        self.conflicts.values()
    }

    pub fn create_conflict(&mut self, mut conflict: LicenseConflict) -> Result<ConflictId> {
        if conflict.first == conflict.second {
            return Err(Error::invalid(
                "license conflict",
                format!("license {} cannot conflict with itself", conflict.first),
            ));
        }
        for license in [conflict.first, conflict.second] {
            if !self.licenses.contains_key(&license) {
                return Err(Error::not_found("license", license));
            }
        }
        if self
            .conflicts
            .values()
            .any(|c| c.first == conflict.first && c.second == conflict.second)
        {
            return Err(Error::duplicate(
                "license conflict",
                format!("{} -> {}", conflict.first, conflict.second),
            ));
        }
        let id = ConflictId(self.next_id());
        conflict.id = Some(id);
        self.conflicts.insert(id, conflict);
        Ok(id)
    }

    pub fn update_conflict(&mut self, conflict: LicenseConflict) -> Result<()> {
        let id = conflict
            .id
            .ok_or_else(|| Error::invalid("license conflict", "conflict has no id"))?;
        let existing = self
            .conflicts
            .get(&id)
            .ok_or_else(|| Error::not_found("license conflict", id))?;
        if existing.first != conflict.first || existing.second != conflict.second {
            return Err(Error::invalid(
                "license conflict",
                "the licence pair of a conflict cannot change",
            ));
        }
        self.conflicts.insert(id, conflict);
        Ok(())
    }

    pub(crate) fn delete_conflicts_for_license(&mut self, license: LicenseId) -> usize {
        let before = self.conflicts.len();
        self.conflicts.retain(|_, c| !c.references(license));
        before - self.conflicts.len()
    }

    // ── Risks ───────────────────────────────────────────────────────────────

    /// Risks in canonical display order: ascending level.
    pub fn risks(&self) -> Vec<&LicenseRisk> {
        let mut risks: Vec<&LicenseRisk> = self.risks.values().collect();
        risks.sort_by_key(|r| r.level);
        risks
    }

    pub fn risk(&self, id: RiskId) -> Option<&LicenseRisk> {
        self.risks.get(&id)
    }

    pub fn create_risk(&mut self, mut risk: LicenseRisk) -> Result<RiskId> {
        if self.risks.values().any(|r| r.level == risk.level) {
            return Err(Error::duplicate("license risk", format!("level {}", risk.level)));
        }
        let id = RiskId(self.next_id());
        risk.id = Some(id);
        self.risks.insert(id, risk);
        Ok(id)
    }

    fn check_risk(&self, risk: Option<RiskId>) -> Result<()> {
        match risk {
            Some(id) if !self.risks.contains_key(&id) => Err(Error::not_found("license risk", id)),
            _ => Ok(()),
        }
    }

    // ── Libraries ───────────────────────────────────────────────────────────

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    pub fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.get(&id)
    }

    pub fn library_by_coordinates(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> Option<&Library> {
        self.libraries
            .values()
            .find(|l| l.has_coordinates(namespace, name, version))
    }

    pub fn libraries_by_hash(&self, hash: &str) -> Vec<&Library> {
        self.libraries.values().filter(|l| l.has_hash(hash)).collect()
    }

    pub fn create_library(&mut self, mut library: Library) -> Result<LibraryId> {
        if library.name.trim().is_empty() {
            return Err(Error::invalid("library", "name is blank"));
        }
        if let Some(existing) =
            self.library_by_coordinates(&library.namespace, &library.name, &library.version)
        {
            return Err(Error::duplicate("library", existing));
        }
        self.check_library_licenses(&library)?;
        let id = LibraryId(self.next_id());
        library.id = Some(id);
        if library.created_date.is_none() {
            library.created_date = Some(Local::now().date_naive());
        }
        debug!("Created Library : {} ({})", library, id);
        self.libraries.insert(id, library);
        Ok(id)
    }

    /// Replace a stored library; its coordinates may only change to a free key.
    pub fn update_library(&mut self, library: Library) -> Result<()> {
        let id = library
            .id
            .ok_or_else(|| Error::invalid("library", "library has no id"))?;
        if !self.libraries.contains_key(&id) {
            return Err(Error::not_found("library", id));
        }
        if let Some(other) = self
            .libraries
            .values()
            .find(|other| other.id != Some(id) && other.same_coordinates(&library))
        {
            return Err(Error::duplicate("library", other));
        }
        self.check_library_licenses(&library)?;
        self.libraries.insert(id, library);
        Ok(())
    }

    pub fn delete_library(&mut self, id: LibraryId) -> Result<Option<Library>> {
        if let Some(project) = self.projects.values().find(|p| p.has_library(id)) {
            return Err(Error::StillReferenced {
                entity: "library",
                key: id.to_string(),
                by: format!("project {project}"),
            });
        }
        Ok(self.libraries.remove(&id))
    }

    fn check_library_licenses(&self, library: &Library) -> Result<()> {
        if let Some(missing) = library
            .referenced_licenses()
            .into_iter()
            .find(|id| !self.licenses.contains_key(id))
        {
            return Err(Error::not_found("license", missing));
        }
        if let Some(last) = library.licenses.last() {
            if last.link.is_some() {
                return Err(Error::invalid(
                    "library",
                    "the last linked licence must not carry a link type",
                ));
            }
        }
        if library.original_license.is_none() {
            debug!("Library {library} has no original license");
        }
        Ok(())
    }

    // ── Projects & dependencies ─────────────────────────────────────────────

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn project_by_key(&self, label: &str, version: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.has_key(label, version))
    }

    pub fn create_project(&mut self, mut project: Project) -> Result<ProjectId> {
        if is_blank(Some(&project.label)) || is_blank(Some(&project.version)) {
            return Err(Error::invalid("project", "label and version are required"));
        }
        if let Some(existing) = self.project_by_key(&project.label, &project.version) {
            return Err(Error::duplicate("project", existing));
        }
        self.check_previous(None, project.previous_project)?;
        let dependencies = std::mem::take(&mut project.dependencies);
        let id = ProjectId(self.next_id());
        project.id = Some(id);
        self.projects.insert(id, project);
        for dependency in dependencies {
            if let Err(e) = self.add_dependency(id, dependency) {
                self.projects.remove(&id);
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Save project fields, keeping its dependencies.
    ///
    /// Flipping `delivered` on stamps `delivered_date`; flipping it off clears it.
    pub fn update_project(&mut self, mut project: Project) -> Result<()> {
        let id = project
            .id
            .ok_or_else(|| Error::invalid("project", "project has no id"))?;
        let Some(stored) = self.projects.get(&id) else {
            return Err(Error::not_found("project", id));
        };
        if let Some(other) = self.project_by_key(&project.label, &project.version) {
            if other.id != Some(id) {
                return Err(Error::duplicate("project", other));
            }
        }
        self.check_previous(Some(id), project.previous_project)?;
        if project.delivered && !stored.delivered {
            project.delivered_date = Some(Utc::now());
        } else if !project.delivered && stored.delivered {
            project.delivered_date = None;
        }
        project.dependencies = stored.dependencies.clone();
        self.projects.insert(id, project);
        Ok(())
    }

    /// Delete a project together with its dependencies; libraries stay.
    pub fn delete_project(&mut self, id: ProjectId) -> Option<Project> {
        let removed = self.projects.remove(&id)?;
        for project in self.projects.values_mut() {
            if project.previous_project == Some(id) {
                project.previous_project = None;
            }
        }
        Some(removed)
    }

    fn check_previous(&self, id: Option<ProjectId>, previous: Option<ProjectId>) -> Result<()> {
        match previous {
            Some(prev) if Some(prev) == id => Err(Error::invalid(
                "project",
                "a project cannot be its own previous version",
            )),
            Some(prev) if !self.projects.contains_key(&prev) => {
                Err(Error::not_found("project", prev))
            }
            _ => Ok(()),
        }
    }

    pub fn add_dependency(
        &mut self,
        project: ProjectId,
        mut dependency: Dependency,
    ) -> Result<DependencyId> {
        if !self.libraries.contains_key(&dependency.library) {
            return Err(Error::not_found("library", dependency.library));
        }
        if !self.projects.contains_key(&project) {
            return Err(Error::not_found("project", project));
        }
        let id = DependencyId(self.next_id());
        dependency.id = Some(id);
        self.projects
            .get_mut(&project)
            .ok_or_else(|| Error::not_found("project", project))?
            .attach(dependency)?;
        Ok(id)
    }

    pub fn remove_dependency(
        &mut self,
        project: ProjectId,
        dependency: DependencyId,
    ) -> Option<Dependency> {
        self.projects.get_mut(&project)?.detach(dependency)
    }

    pub fn update_dependency(&mut self, project: ProjectId, dependency: Dependency) -> Result<()> {
        let id = dependency
            .id
            .ok_or_else(|| Error::invalid("dependency", "dependency has no id"))?;
        let owner = self
            .projects
            .get_mut(&project)
            .ok_or_else(|| Error::not_found("project", project))?;
        let slot = owner
            .dependencies
            .iter_mut()
            .find(|d| d.id == Some(id))
            .ok_or_else(|| Error::not_found("dependency", id))?;
        if slot.library != dependency.library {
            return Err(Error::invalid(
                "dependency",
                "the library of a dependency cannot change",
            ));
        }
        *slot = dependency;
        Ok(())
    }

    pub(crate) fn project_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(&id)
    }

    /// Every dependency together with the id of its owning project.
    pub fn dependencies(&self) -> impl Iterator<Item = (ProjectId, &Dependency)> {
        self.projects.iter().flat_map(|(id, p)| {
            p.dependencies.iter().map(move |d| (*id, d))
        })
    }
}
