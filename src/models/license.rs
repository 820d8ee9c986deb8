use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ConflictId, LicenseId, RiskId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: Option<LicenseId>,
    /// Short code such as `MIT`; unique, compared case-insensitively.
    pub short_identifier: String,
    pub full_name: String,
    #[serde(default)]
    pub spdx_identifier: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub last_reviewed_by: Option<String>,
    #[serde(default)]
    pub last_reviewed_date: Option<NaiveDate>,
    #[serde(default)]
    pub license_risk: Option<RiskId>,
}

entity_identity!(License, LicenseId);

impl License {
    pub fn new(short_identifier: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: None,
            short_identifier: short_identifier.into(),
            full_name: full_name.into(),
            spdx_identifier: None,
            url: None,
            reviewed: false,
            last_reviewed_by: None,
            last_reviewed_date: None,
            license_risk: None,
        }
    }

    pub fn with_spdx(mut self, spdx: impl Into<String>) -> Self {
        self.spdx_identifier = Some(spdx.into());
        self
    }

    pub fn with_risk(mut self, risk: RiskId) -> Self {
        self.license_risk = Some(risk);
        self
    }

    /// Whether `identifier` names this licence by short or SPDX identifier.
    pub fn is_named(&self, identifier: &str) -> bool {
        super::key_eq(&self.short_identifier, identifier)
            || self
                .spdx_identifier
                .as_deref()
                .is_some_and(|spdx| super::key_eq(spdx, identifier))
    }
}

/// Ordinal severity; ascending `level` is the canonical display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRisk {
    pub id: Option<RiskId>,
    pub name: String,
    pub level: i32,
    #[serde(default)]
    pub description: Option<String>,
}

entity_identity!(LicenseRisk, RiskId);

impl LicenseRisk {
    pub fn new(name: impl Into<String>, level: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            level,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompatibilityState {
    Compatible,
    Incompatible,
    Unknown,
}

impl std::fmt::Display for CompatibilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompatibilityState::Compatible => write!(f, "Compatible"),
            CompatibilityState::Incompatible => write!(f, "Incompatible"),
            CompatibilityState::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for CompatibilityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compatible" => Ok(CompatibilityState::Compatible),
            "incompatible" => Ok(CompatibilityState::Incompatible),
            "unknown" => Ok(CompatibilityState::Unknown),
            other => Err(format!("unknown compatibility state '{other}'")),
        }
    }
}

/// A curated, directional statement about `first` being used together with `second`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConflict {
    pub id: Option<ConflictId>,
    pub first: LicenseId,
    pub second: LicenseId,
    pub compatibility: CompatibilityState,
    #[serde(default)]
    pub comment: Option<String>,
}

entity_identity!(LicenseConflict, ConflictId);

impl LicenseConflict {
    pub fn new(first: LicenseId, second: LicenseId, compatibility: CompatibilityState) -> Self {
        Self {
            id: None,
            first,
            second,
            compatibility,
            comment: None,
        }
    }

    pub fn references(&self, license: LicenseId) -> bool {
        self.first == license || self.second == license
    }
}
