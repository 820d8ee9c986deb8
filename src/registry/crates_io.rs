use serde_json::Value;

use super::{join, Source};
use crate::models::{Library, LibraryType};

pub const DEFAULT_URL: &str = "https://crates.io/";

/// crates.io API: `GET {base}/api/v1/crates/{name}/{version}`.
pub struct CratesIo {
    base_url: String,
}

impl CratesIo {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for CratesIo {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl Source for CratesIo {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn library_type(&self) -> LibraryType {
        LibraryType::Cargo
    }

    fn url(&self, library: &Library) -> Option<String> {
        let (name, version) = (library.name.trim(), library.version.trim());
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(join(&self.base_url, &format!("api/v1/crates/{name}/{version}")))
    }

    fn extract_license(&self, payload: &str) -> Result<Option<String>, String> {
        let data: Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        Ok(data
            .get("version")
            .and_then(|v| v.get("license"))
            .and_then(|l| l.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string))
    }
}
