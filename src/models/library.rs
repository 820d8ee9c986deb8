use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{is_blank, key_eq, LibraryId, LicenseId, RiskId};

/// Package ecosystem a library was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    Npm,
    Maven,
    Pypi,
    Cargo,
    Nuget,
    Generic,
}

impl std::fmt::Display for LibraryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryType::Npm => write!(f, "npm"),
            LibraryType::Maven => write!(f, "maven"),
            LibraryType::Pypi => write!(f, "pypi"),
            LibraryType::Cargo => write!(f, "cargo"),
            LibraryType::Nuget => write!(f, "nuget"),
            LibraryType::Generic => write!(f, "generic"),
        }
    }
}

impl FromStr for LibraryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npm" => Ok(LibraryType::Npm),
            "maven" => Ok(LibraryType::Maven),
            "pypi" => Ok(LibraryType::Pypi),
            "cargo" => Ok(LibraryType::Cargo),
            "nuget" => Ok(LibraryType::Nuget),
            "generic" => Ok(LibraryType::Generic),
            other => Err(format!("unknown library type '{other}'")),
        }
    }
}

/// How a linked licence combines with the one that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkType {
    And,
    Or,
}

/// One element of the licence expression found for a library.
///
/// The last element of a list never carries a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedLicense {
    pub license: LicenseId,
    pub link: Option<LinkType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Open,
    Closed,
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(LogStatus::Open),
            "closed" => Ok(LogStatus::Closed),
            other => Err(format!("unknown log status '{other}'")),
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Open => write!(f, "OPEN"),
            LogStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub issue: String,
    pub message: String,
    pub severity: LogSeverity,
    pub status: LogStatus,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLog {
    /// `"{issue} - {message}"`, the key used to avoid duplicate entries.
    pub fn summary(&self) -> String {
        format!("{} - {}", self.issue, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: Option<LibraryId>,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub library_type: LibraryType,
    /// Licence string as detected, before any linking.
    #[serde(default)]
    pub original_license: Option<String>,
    #[serde(default)]
    pub licenses: Vec<LinkedLicense>,
    #[serde(default)]
    pub license_to_publish: BTreeSet<LicenseId>,
    #[serde(default)]
    pub license_of_files: BTreeSet<LicenseId>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub source_code_url: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub last_reviewed_by: Option<String>,
    #[serde(default)]
    pub last_reviewed_date: Option<NaiveDate>,
    #[serde(default)]
    pub hide_for_publishing: bool,
    #[serde(default)]
    pub created_date: Option<NaiveDate>,
    #[serde(default)]
    pub library_risk: Option<RiskId>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub error_logs: Vec<ErrorLog>,
}

entity_identity!(Library, LibraryId);

impl Library {
    pub fn new(
        library_type: LibraryType,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            library_type,
            original_license: None,
            licenses: Vec::new(),
            license_to_publish: BTreeSet::new(),
            license_of_files: BTreeSet::new(),
            md5: None,
            sha1: None,
            source_code_url: None,
            license_url: None,
            reviewed: false,
            last_reviewed_by: None,
            last_reviewed_date: None,
            hide_for_publishing: false,
            created_date: None,
            library_risk: None,
            comment: None,
            error_logs: Vec::new(),
        }
    }

    pub fn with_original_license(mut self, license: impl Into<String>) -> Self {
        self.original_license = Some(license.into());
        self
    }

    pub fn has_original_license(&self) -> bool {
        !is_blank(self.original_license.as_deref())
    }

    /// Natural-key match on namespace, name and version; case-insensitive.
    pub fn has_coordinates(&self, namespace: &str, name: &str, version: &str) -> bool {
        key_eq(&self.namespace, namespace) && key_eq(&self.name, name) && key_eq(&self.version, version)
    }

    pub fn same_coordinates(&self, other: &Library) -> bool {
        self.has_coordinates(&other.namespace, &other.name, &other.version)
    }

    /// Same artifact regardless of version: namespace, name and type agree.
    ///
    /// A blank namespace only matches another blank namespace.
    pub fn same_artifact(&self, other: &Library) -> bool {
        let (a, b) = (self.namespace.trim(), other.namespace.trim());
        if a.is_empty() != b.is_empty() {
            return false;
        }
        a == b && self.name == other.name && self.library_type == other.library_type
    }

    /// `namespace:name:type`, or `name:type` without a namespace.
    pub fn label(&self) -> String {
        if self.namespace.trim().is_empty() {
            format!("{}:{}", self.name, self.library_type)
        } else {
            format!("{}:{}:{}", self.namespace, self.name, self.library_type)
        }
    }

    pub fn has_hash(&self, hash: &str) -> bool {
        let hash = hash.to_lowercase();
        [self.md5.as_deref(), self.sha1.as_deref()]
            .into_iter()
            .flatten()
            .any(|h| h.to_lowercase() == hash)
    }

    pub fn contains_error_log(&self, summary: &str) -> bool {
        self.error_logs.iter().any(|log| log.summary() == summary)
    }

    /// Append an open entry unless one with the same issue and message exists.
    ///
    /// Returns whether an entry was added.
    pub fn add_error_log(
        &mut self,
        issue: impl Into<String>,
        message: impl Into<String>,
        severity: LogSeverity,
    ) -> bool {
        let entry = ErrorLog {
            issue: issue.into(),
            message: message.into(),
            severity,
            status: LogStatus::Open,
            timestamp: Utc::now(),
        };
        if self.contains_error_log(&entry.summary()) {
            return false;
        }
        self.error_logs.push(entry);
        true
    }

    /// Every licence referenced by this library, in any role.
    pub fn referenced_licenses(&self) -> BTreeSet<LicenseId> {
        self.licenses
            .iter()
            .map(|l| l.license)
            .chain(self.license_to_publish.iter().copied())
            .chain(self.license_of_files.iter().copied())
            .collect()
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ {} - {} - {} ]", self.namespace, self.name, self.version)
    }
}
