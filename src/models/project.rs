use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{DependencyId, Library, LibraryId, ProjectId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadState {
    #[default]
    Ok,
    Processing,
    Failure,
}

impl FromStr for UploadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Ok(UploadState::Ok),
            "processing" => Ok(UploadState::Processing),
            "failure" => Ok(UploadState::Failure),
            other => Err(format!("unknown upload state '{other}'")),
        }
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadState::Ok => write!(f, "OK"),
            UploadState::Processing => write!(f, "PROCESSING"),
            UploadState::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Use of one [`Library`] by the [`Project`] that holds this value.
///
/// A dependency lives inside exactly one project's `dependencies`, so its
/// owner is never ambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Option<DependencyId>,
    pub library: LibraryId,
    pub added_date: NaiveDate,
    #[serde(default)]
    pub added_manually: bool,
    #[serde(default)]
    pub hide_for_publishing: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

entity_identity!(Dependency, DependencyId);

impl Dependency {
    pub fn new(library: LibraryId) -> Self {
        Self {
            id: None,
            library,
            added_date: Local::now().date_naive(),
            added_manually: false,
            hide_for_publishing: false,
            comment: None,
        }
    }

    pub fn manual(library: LibraryId) -> Self {
        Self {
            added_manually: true,
            ..Self::new(library)
        }
    }

    /// Visible for publishing unless hidden on either the dependency or the library.
    pub fn is_visible(&self, library: &Library) -> bool {
        !(self.hide_for_publishing || library.hide_for_publishing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<ProjectId>,
    pub name: String,
    pub label: String,
    pub version: String,
    #[serde(default)]
    pub created_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_updated_date: Option<NaiveDate>,
    #[serde(default)]
    pub upload_state: UploadState,
    #[serde(default)]
    pub disclaimer: Option<String>,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub delivered_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub upload_filter: Option<String>,
    #[serde(default)]
    pub previous_project: Option<ProjectId>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

entity_identity!(Project, ProjectId);

impl Project {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            label: label.into(),
            version: version.into(),
            created_date: Some(Local::now().date_naive()),
            last_updated_date: None,
            upload_state: UploadState::Ok,
            disclaimer: None,
            delivered: false,
            delivered_date: None,
            contact: None,
            comment: None,
            upload_filter: None,
            previous_project: None,
            dependencies: Vec::new(),
        }
    }

    pub fn has_key(&self, label: &str, version: &str) -> bool {
        super::key_eq(&self.label, label) && super::key_eq(&self.version, version)
    }

    pub fn has_library(&self, library: LibraryId) -> bool {
        self.dependencies.iter().any(|d| d.library == library)
    }

    pub fn dependency(&self, id: DependencyId) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.id == Some(id))
    }

    /// Take ownership of `dependency`; a library may only be used once per project.
    pub fn attach(&mut self, dependency: Dependency) -> Result<()> {
        if self.has_library(dependency.library) {
            return Err(Error::duplicate(
                "dependency",
                format!("library {} in project {}", dependency.library, self),
            ));
        }
        self.dependencies.push(dependency);
        Ok(())
    }

    /// Release a dependency; the library itself is untouched.
    pub fn detach(&mut self, id: DependencyId) -> Option<Dependency> {
        let position = self.dependencies.iter().position(|d| d.id == Some(id))?;
        Some(self.dependencies.remove(position))
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ {} - {} ]", self.label, self.version)
    }
}

/// A refused [`transfer_dependency`]; both projects come back untouched.
#[derive(Debug)]
pub struct TransferRejected {
    pub error: Error,
    pub from: Project,
    pub to: Project,
}

/// Move one dependency from `from` to `to`, returning both projects.
pub fn transfer_dependency(
    mut from: Project,
    mut to: Project,
    id: DependencyId,
) -> std::result::Result<(Project, Project), TransferRejected> {
    let library = match from.dependency(id) {
        Some(dependency) => dependency.library,
        None => {
            let error = Error::not_found("dependency", format!("{id} in project {from}"));
            return Err(TransferRejected { error, from, to });
        }
    };
    if to.has_library(library) {
        let error = Error::duplicate("dependency", format!("library {library} in project {to}"));
        return Err(TransferRejected { error, from, to });
    }
    if let Some(dependency) = from.detach(id) {
        to.dependencies.push(dependency);
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LibraryType;

    fn dependency(id: u64, library: u64) -> Dependency {
        Dependency {
            id: Some(DependencyId(id)),
            ..Dependency::new(LibraryId(library))
        }
    }

    #[test]
    fn hidden_on_either_side() {
        let mut library = Library::new(LibraryType::Npm, "", "left-pad", "1.3.0");
        let mut dep = Dependency::new(LibraryId(1));
        assert!(dep.is_visible(&library));

        library.hide_for_publishing = true;
        assert!(!dep.is_visible(&library));

        library.hide_for_publishing = false;
        dep.hide_for_publishing = true;
        assert!(!dep.is_visible(&library));
    }

    #[test]
    fn attach_rejects_second_use_of_library() {
        let mut project = Project::new("App", "app", "1.0");
        project.attach(dependency(1, 10)).unwrap();
        assert!(project.attach(dependency(2, 10)).is_err());
        assert_eq!(project.dependencies.len(), 1);
    }

    #[test]
    fn transfer_moves_exactly_one_dependency() {
        let mut a = Project::new("App", "app", "1.0");
        let b = Project::new("App", "app", "2.0");
        a.attach(dependency(1, 10)).unwrap();
        a.attach(dependency(2, 11)).unwrap();

        let (a, b) = transfer_dependency(a, b, DependencyId(1)).unwrap();
        assert!(!a.has_library(LibraryId(10)));
        assert!(b.has_library(LibraryId(10)));
        assert_eq!(a.dependencies.len() + b.dependencies.len(), 2);

        let (_, b) = transfer_dependency(a, b, DependencyId(2)).unwrap();
        assert_eq!(b.dependencies.len(), 2);
    }

    #[test]
    fn transfer_refuses_duplicate_library() {
        let mut a = Project::new("App", "app", "1.0");
        let mut b = Project::new("App", "app", "2.0");
        a.attach(dependency(1, 10)).unwrap();
        b.attach(dependency(2, 10)).unwrap();
        let rejected = transfer_dependency(a, b, DependencyId(1)).unwrap_err();
        assert!(matches!(rejected.error, Error::Duplicate { .. }));
        assert_eq!(rejected.from.dependencies.len(), 1);
        assert_eq!(rejected.to.dependencies.len(), 1);
    }
}
