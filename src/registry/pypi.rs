use serde_json::Value;

use super::{join, Source};
use crate::models::{Library, LibraryType};

pub const DEFAULT_URL: &str = "https://pypi.org/";

const CLASSIFIER_PREFIX: &str = "License :: OSI Approved :: ";

/// PyPI JSON API: `GET {base}/pypi/{name}/{version}/json`.
pub struct Pypi {
    base_url: String,
}

impl Pypi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for Pypi {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl Source for Pypi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn library_type(&self) -> LibraryType {
        LibraryType::Pypi
    }

    fn url(&self, library: &Library) -> Option<String> {
        let name = library.name.trim();
        if name.is_empty() {
            return None;
        }
        let path = if library.version == "*" || library.version.trim().is_empty() {
            format!("pypi/{name}/json")
        } else {
            format!("pypi/{name}/{}/json", library.version.trim())
        };
        Some(join(&self.base_url, &path))
    }

    /// `info.license_expression`, then `info.license`, then the first OSI classifier.
    fn extract_license(&self, payload: &str) -> Result<Option<String>, String> {
        let data: Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        let info = data.get("info").unwrap_or(&Value::Null);

        let text = |key: &str| {
            info.get(key)
                .and_then(|l| l.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let license = text("license_expression").or_else(|| text("license")).or_else(|| {
            info.get("classifiers")
                .and_then(|c| c.as_array())
                .into_iter()
                .flatten()
                .filter_map(|c| c.as_str())
                .find_map(|c| c.strip_prefix(CLASSIFIER_PREFIX))
                .map(str::to_string)
        });
        Ok(license)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let library = Library::new(LibraryType::Pypi, "", "requests", "2.31.0");
        assert_eq!(
            Pypi::default().url(&library).as_deref(),
            Some("https://pypi.org/pypi/requests/2.31.0/json")
        );
    }

    #[test]
    fn test_extract_license() {
        let pypi = Pypi::default();
        assert_eq!(
            pypi.extract_license(r#"{"info":{"license":"Apache 2.0"}}"#),
            Ok(Some("Apache 2.0".to_string()))
        );
        assert_eq!(
            pypi.extract_license(
                r#"{"info":{"license":"","classifiers":["Programming Language :: Python","License :: OSI Approved :: MIT License"]}}"#
            ),
            Ok(Some("MIT License".to_string()))
        );
        assert_eq!(pypi.extract_license(r#"{"info":{"license":null}}"#), Ok(None));
        assert!(pypi.extract_license("{").is_err());
    }
}
