use serde_json::Value;

use super::{join, Source};
use crate::models::{is_blank, Library, LibraryType};

pub const DEFAULT_URL: &str = "https://registry.npmjs.org/";

/// The npm registry: `GET {base}/{namespace}/{name}/{version}`.
pub struct Npm {
    base_url: String,
}

impl Npm {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for Npm {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl Source for Npm {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn library_type(&self) -> LibraryType {
        LibraryType::Npm
    }

    fn url(&self, library: &Library) -> Option<String> {
        if library.name.trim().is_empty() {
            return None;
        }
        // `*` asks for the document of all versions; the latest one is read from it.
        let version = if library.version == "*" {
            None
        } else {
            Some(library.version.as_str())
        };
        let identifier = match (is_blank(Some(&library.namespace)), version) {
            (true, Some(v)) => format!("{}/{}", library.name, v),
            (true, None) => library.name.clone(),
            (false, Some(v)) => format!("{}/{}/{}", library.namespace, library.name, v),
            (false, None) => format!("{}/{}", library.namespace, library.name),
        };
        Some(join(&self.base_url, &identifier))
    }

    fn extract_license(&self, payload: &str) -> Result<Option<String>, String> {
        let data: Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;

        // A full package document has the licence under versions[dist-tags.latest].
        let document = match data
            .get("dist-tags")
            .and_then(|d| d.get("latest"))
            .and_then(|v| v.as_str())
        {
            Some(latest) => data
                .get("versions")
                .and_then(|vs| vs.get(latest))
                .unwrap_or(&Value::Null),
            None => &data,
        };

        let license = match document.get("license") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(o)) => o.get("type").and_then(|t| t.as_str()).map(str::to_string),
            _ => None,
        };
        Ok(license.filter(|l| !l.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "left-pad", "1.3.0", "https://registry.npmjs.org/left-pad/1.3.0")]
    #[case("@types", "node", "20.1.0", "https://registry.npmjs.org/@types/node/20.1.0")]
    #[case("", "lodash", "*", "https://registry.npmjs.org/lodash")]
    fn test_url(#[case] namespace: &str, #[case] name: &str, #[case] version: &str, #[case] url: &str) {
        let library = Library::new(LibraryType::Npm, namespace, name, version);
        assert_eq!(Npm::default().url(&library).as_deref(), Some(url));
    }

    #[rstest]
    #[case(r#"{"license":"(MIT)"}"#, Some("(MIT)"))]
    #[case(r#"{"license":{"type":"ISC","url":"https://opensource.org/licenses/ISC"}}"#, Some("ISC"))]
    #[case(r#"{"license":null}"#, None)]
    #[case(r#"{"name":"left-pad"}"#, None)]
    #[case(r#"{"dist-tags":{"latest":"2.0.0"},"versions":{"2.0.0":{"license":"MIT"}}}"#, Some("MIT"))]
    fn test_extract_license(#[case] payload: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            Npm::default().extract_license(payload),
            Ok(expected.map(str::to_string))
        );
    }

    #[test]
    fn test_malformed_payload() {
        assert!(Npm::default().extract_license("<html>").is_err());
    }
}
