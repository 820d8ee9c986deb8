//! Field tables of the four queryable row types.
//!
//! Joins are written out per field: each variant knows which relation it
//! walks, so a missing related entity simply yields no value.

use serde::Serialize;

use super::value::{Kind, Scalar};
use super::{Cardinality, FieldSpec, Target};
use crate::models::{Dependency, Library, License, LicenseId, Project, ProjectId};
use crate::store::Graph;

const LIBRARY_TYPES: &[&str] = &["npm", "maven", "pypi", "cargo", "nuget", "generic"];
const LOG_STATUSES: &[&str] = &["OPEN", "CLOSED"];
const UPLOAD_STATES: &[&str] = &["OK", "PROCESSING", "FAILURE"];

fn single<F>(field: F, kind: Kind) -> Option<FieldSpec<F>> {
    Some(FieldSpec {
        field,
        kind,
        cardinality: Cardinality::Single,
    })
}

fn many<F>(field: F, kind: Kind) -> Option<FieldSpec<F>> {
    Some(FieldSpec {
        field,
        kind,
        cardinality: Cardinality::Many,
    })
}

fn id(raw: Option<u64>) -> Vec<Scalar> {
    raw.map(Scalar::Int).into_iter().collect()
}

fn text<S: AsRef<str>>(raw: Option<S>) -> Vec<Scalar> {
    raw.map(|s| Scalar::text(s.as_ref())).into_iter().collect()
}

fn date(raw: Option<chrono::NaiveDate>) -> Vec<Scalar> {
    raw.map(Scalar::Date).into_iter().collect()
}

fn flag(raw: bool) -> Vec<Scalar> {
    vec![Scalar::Bool(raw)]
}

fn short_identifiers<'a>(graph: &Graph, ids: impl Iterator<Item = &'a LicenseId>) -> Vec<Scalar> {
    ids.filter_map(|id| graph.license(*id))
        .map(|l| Scalar::text(l.short_identifier.as_str()))
        .collect()
}

// ── Dependency ──────────────────────────────────────────────────────────────

/// A dependency together with the project that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyRow {
    pub project: ProjectId,
    pub dependency: Dependency,
}

#[derive(Debug, Clone, Copy)]
pub struct Dependencies;

#[derive(Debug, Clone, Copy)]
pub enum DependencyField {
    Id,
    AddedDate,
    AddedManually,
    HideForPublishing,
    Comment,
    LibraryId,
    ProjectId,
    /// Library name or namespace.
    Name,
    LibraryType,
    LibraryReviewed,
    LicensesShortIdentifier,
    LibraryRiskId,
    ErrorLogMessage,
    ErrorLogStatus,
    LibraryCreatedDate,
}

impl Target for Dependencies {
    const ENTITY: &'static str = "dependency";
    type Field = DependencyField;
    type Item = DependencyRow;

    fn field(name: &str) -> Option<FieldSpec<DependencyField>> {
        use DependencyField as F;
        match name {
            "id" => single(F::Id, Kind::Id),
            "addedDate" => single(F::AddedDate, Kind::Date),
            "addedManually" => single(F::AddedManually, Kind::Bool),
            "hideForPublishing" => single(F::HideForPublishing, Kind::Bool),
            "comment" => single(F::Comment, Kind::Text),
            "libraryId" => single(F::LibraryId, Kind::Id),
            "projectId" => single(F::ProjectId, Kind::Id),
            "name" => Some(FieldSpec {
                field: F::Name,
                kind: Kind::Text,
                cardinality: Cardinality::AnyOf,
            }),
            "libraryType" => single(F::LibraryType, Kind::Enum(LIBRARY_TYPES)),
            "libraryReviewed" => single(F::LibraryReviewed, Kind::Bool),
            "licensesShortIdentifier" => many(F::LicensesShortIdentifier, Kind::Text),
            "libraryRiskId" => single(F::LibraryRiskId, Kind::Id),
            "errorLogMessage" => many(F::ErrorLogMessage, Kind::Text),
            "errorLogStatus" => many(F::ErrorLogStatus, Kind::Enum(LOG_STATUSES)),
            "libraryCreatedDate" => single(F::LibraryCreatedDate, Kind::Date),
            _ => None,
        }
    }

    fn rows(graph: &Graph) -> Vec<DependencyRow> {
        let mut rows: Vec<DependencyRow> = graph
            .dependencies()
            .map(|(project, dependency)| DependencyRow {
                project,
                dependency: dependency.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.dependency.id);
        rows
    }

    fn values(graph: &Graph, row: &DependencyRow, field: DependencyField) -> Vec<Scalar> {
        use DependencyField as F;
        let dependency = &row.dependency;
        let library = graph.library(dependency.library);
        match field {
            F::Id => id(dependency.id.map(|i| i.0)),
            F::AddedDate => date(Some(dependency.added_date)),
            F::AddedManually => flag(dependency.added_manually),
            F::HideForPublishing => flag(dependency.hide_for_publishing),
            F::Comment => text(dependency.comment.as_deref()),
            F::LibraryId => id(Some(dependency.library.0)),
            F::ProjectId => id(Some(row.project.0)),
            F::Name => library
                .map(|l| {
                    [l.name.as_str(), l.namespace.as_str()]
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .map(Scalar::text)
                        .collect()
                })
                .unwrap_or_default(),
            F::LibraryType => text(library.map(|l| l.library_type.to_string()).as_deref()),
            F::LibraryReviewed => library.map(|l| flag(l.reviewed)).unwrap_or_default(),
            F::LicensesShortIdentifier => library
                .map(|l| short_identifiers(graph, l.licenses.iter().map(|ll| &ll.license)))
                .unwrap_or_default(),
            F::LibraryRiskId => id(library.and_then(|l| l.library_risk).map(|r| r.0)),
            F::ErrorLogMessage => library
                .map(|l| l.error_logs.iter().map(|e| Scalar::text(e.message.as_str())).collect())
                .unwrap_or_default(),
            F::ErrorLogStatus => library
                .map(|l| l.error_logs.iter().map(|e| Scalar::text(e.status.to_string())).collect())
                .unwrap_or_default(),
            F::LibraryCreatedDate => date(library.and_then(|l| l.created_date)),
        }
    }
}

// ── Library ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Libraries;

#[derive(Debug, Clone, Copy)]
pub enum LibraryField {
    Id,
    Namespace,
    Name,
    Version,
    Type,
    OriginalLicense,
    Md5,
    Sha1,
    Reviewed,
    HideForPublishing,
    CreatedDate,
    LibraryRiskId,
    LicensesShortIdentifier,
    LicenseToPublishShortIdentifier,
    LicenseOfFilesShortIdentifier,
    ProjectId,
    ErrorLogStatus,
}

impl Target for Libraries {
    const ENTITY: &'static str = "library";
    type Field = LibraryField;
    type Item = Library;

    fn field(name: &str) -> Option<FieldSpec<LibraryField>> {
        use LibraryField as F;
        match name {
            "id" => single(F::Id, Kind::Id),
            "namespace" => single(F::Namespace, Kind::Text),
            "name" => single(F::Name, Kind::Text),
            "version" => single(F::Version, Kind::Text),
            "type" => single(F::Type, Kind::Enum(LIBRARY_TYPES)),
            "originalLicense" => single(F::OriginalLicense, Kind::Text),
            "md5" => single(F::Md5, Kind::Caseless),
            "sha1" => single(F::Sha1, Kind::Caseless),
            "reviewed" => single(F::Reviewed, Kind::Bool),
            "hideForPublishing" => single(F::HideForPublishing, Kind::Bool),
            "createdDate" => single(F::CreatedDate, Kind::Date),
            "libraryRiskId" => single(F::LibraryRiskId, Kind::Id),
            "licensesShortIdentifier" => many(F::LicensesShortIdentifier, Kind::Text),
            "licenseToPublishShortIdentifier" => {
                many(F::LicenseToPublishShortIdentifier, Kind::Text)
            }
            "licenseOfFilesShortIdentifier" => many(F::LicenseOfFilesShortIdentifier, Kind::Text),
            "projectId" => many(F::ProjectId, Kind::Id),
            "errorLogStatus" => many(F::ErrorLogStatus, Kind::Enum(LOG_STATUSES)),
            _ => None,
        }
    }

    fn rows(graph: &Graph) -> Vec<Library> {
        graph.libraries().cloned().collect()
    }

    fn values(graph: &Graph, library: &Library, field: LibraryField) -> Vec<Scalar> {
        use LibraryField as F;
        let caseless = |s: Option<&String>| text(s.map(|h| h.to_lowercase()).as_deref());
        match field {
            F::Id => id(library.id.map(|i| i.0)),
            F::Namespace => text(Some(&library.namespace)),
            F::Name => text(Some(&library.name)),
            F::Version => text(Some(&library.version)),
            F::Type => vec![Scalar::text(library.library_type.to_string())],
            F::OriginalLicense => text(library.original_license.as_deref()),
            F::Md5 => caseless(library.md5.as_ref()),
            F::Sha1 => caseless(library.sha1.as_ref()),
            F::Reviewed => flag(library.reviewed),
            F::HideForPublishing => flag(library.hide_for_publishing),
            F::CreatedDate => date(library.created_date),
            F::LibraryRiskId => id(library.library_risk.map(|r| r.0)),
            F::LicensesShortIdentifier => {
                short_identifiers(graph, library.licenses.iter().map(|l| &l.license))
            }
            F::LicenseToPublishShortIdentifier => {
                short_identifiers(graph, library.license_to_publish.iter())
            }
            F::LicenseOfFilesShortIdentifier => {
                short_identifiers(graph, library.license_of_files.iter())
            }
            F::ProjectId => match library.id {
                Some(lib) => graph
                    .projects()
                    .filter(|p| p.has_library(lib))
                    .filter_map(|p| p.id)
                    .map(|p| Scalar::Int(p.0))
                    .collect(),
                None => Vec::new(),
            },
            F::ErrorLogStatus => library
                .error_logs
                .iter()
                .map(|e| Scalar::text(e.status.to_string()))
                .collect(),
        }
    }
}

// ── License ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Licenses;

#[derive(Debug, Clone, Copy)]
pub enum LicenseField {
    Id,
    FullName,
    ShortIdentifier,
    SpdxIdentifier,
    Url,
    Reviewed,
    LastReviewedDate,
    LastReviewedBy,
    LicenseConflictId,
    LicenseRiskId,
    LibraryPublishId,
    LibraryFilesId,
    /// Short identifier, ignoring case.
    Name,
}

impl Target for Licenses {
    const ENTITY: &'static str = "license";
    type Field = LicenseField;
    type Item = License;

    fn field(name: &str) -> Option<FieldSpec<LicenseField>> {
        use LicenseField as F;
        match name {
            "id" => single(F::Id, Kind::Id),
            "fullName" => single(F::FullName, Kind::Text),
            "shortIdentifier" => single(F::ShortIdentifier, Kind::Text),
            "spdxIdentifier" => single(F::SpdxIdentifier, Kind::Text),
            "url" => single(F::Url, Kind::Text),
            "reviewed" => single(F::Reviewed, Kind::Bool),
            "lastReviewedDate" => single(F::LastReviewedDate, Kind::Date),
            "lastReviewedBy" => single(F::LastReviewedBy, Kind::Text),
            "licenseConflictId" => many(F::LicenseConflictId, Kind::Id),
            "licenseRiskId" => single(F::LicenseRiskId, Kind::Id),
            "libraryPublishId" => many(F::LibraryPublishId, Kind::Id),
            "libraryFilesId" => many(F::LibraryFilesId, Kind::Id),
            "name" => single(F::Name, Kind::Caseless),
            _ => None,
        }
    }

    fn rows(graph: &Graph) -> Vec<License> {
        graph.licenses().cloned().collect()
    }

    fn values(graph: &Graph, license: &License, field: LicenseField) -> Vec<Scalar> {
        use LicenseField as F;
        match field {
            F::Id => id(license.id.map(|i| i.0)),
            F::FullName => text(Some(&license.full_name)),
            F::ShortIdentifier => text(Some(&license.short_identifier)),
            F::SpdxIdentifier => text(license.spdx_identifier.as_deref()),
            F::Url => text(license.url.as_deref()),
            F::Reviewed => flag(license.reviewed),
            F::LastReviewedDate => date(license.last_reviewed_date),
            F::LastReviewedBy => text(license.last_reviewed_by.as_deref()),
            F::LicenseConflictId => match license.id {
                Some(lid) => graph
                    .conflicts()
                    .filter(|c| c.first == lid)
                    .filter_map(|c| c.id)
                    .map(|c| Scalar::Int(c.0))
                    .collect(),
                None => Vec::new(),
            },
            F::LicenseRiskId => id(license.license_risk.map(|r| r.0)),
            F::LibraryPublishId | F::LibraryFilesId => {
                let Some(lid) = license.id else {
                    return Vec::new();
                };
                let publish = matches!(field, F::LibraryPublishId);
                graph
                    .libraries()
                    .filter(|l| {
                        if publish {
                            l.license_to_publish.contains(&lid)
                        } else {
                            l.license_of_files.contains(&lid)
                        }
                    })
                    .filter_map(|l| l.id)
                    .map(|l| Scalar::Int(l.0))
                    .collect()
            }
            F::Name => vec![Scalar::text(license.short_identifier.to_lowercase())],
        }
    }
}

// ── Project ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Projects;

#[derive(Debug, Clone, Copy)]
pub enum ProjectField {
    Id,
    Name,
    Label,
    Version,
    CreatedDate,
    LastUpdatedDate,
    UploadState,
    Delivered,
    DeliveredDate,
    Contact,
    Comment,
    PreviousProjectId,
    UploadFilter,
    LibraryId,
}

impl Target for Projects {
    const ENTITY: &'static str = "project";
    type Field = ProjectField;
    type Item = Project;

    fn field(name: &str) -> Option<FieldSpec<ProjectField>> {
        use ProjectField as F;
        match name {
            "id" => single(F::Id, Kind::Id),
            "name" => single(F::Name, Kind::Text),
            "label" => single(F::Label, Kind::Text),
            "version" => single(F::Version, Kind::Text),
            "createdDate" => single(F::CreatedDate, Kind::Date),
            "lastUpdatedDate" => single(F::LastUpdatedDate, Kind::Date),
            "uploadState" => single(F::UploadState, Kind::Enum(UPLOAD_STATES)),
            "delivered" => single(F::Delivered, Kind::Bool),
            "deliveredDate" => single(F::DeliveredDate, Kind::Timestamp),
            "contact" => single(F::Contact, Kind::Text),
            "comment" => single(F::Comment, Kind::Text),
            "previousProjectId" => single(F::PreviousProjectId, Kind::Id),
            "uploadFilter" => single(F::UploadFilter, Kind::Text),
            "libraryId" => many(F::LibraryId, Kind::Id),
            _ => None,
        }
    }

    fn rows(graph: &Graph) -> Vec<Project> {
        graph.projects().cloned().collect()
    }

    fn values(_graph: &Graph, project: &Project, field: ProjectField) -> Vec<Scalar> {
        use ProjectField as F;
        match field {
            F::Id => id(project.id.map(|i| i.0)),
            F::Name => text(Some(&project.name)),
            F::Label => text(Some(&project.label)),
            F::Version => text(Some(&project.version)),
            F::CreatedDate => date(project.created_date),
            F::LastUpdatedDate => date(project.last_updated_date),
            F::UploadState => vec![Scalar::text(project.upload_state.to_string())],
            F::Delivered => flag(project.delivered),
            F::DeliveredDate => project
                .delivered_date
                .map(Scalar::Timestamp)
                .into_iter()
                .collect(),
            F::Contact => text(project.contact.as_deref()),
            F::Comment => text(project.comment.as_deref()),
            F::PreviousProjectId => id(project.previous_project.map(|p| p.0)),
            F::UploadFilter => text(project.upload_filter.as_deref()),
            F::LibraryId => project
                .dependencies
                .iter()
                .map(|d| Scalar::Int(d.library.0))
                .collect(),
        }
    }
}
