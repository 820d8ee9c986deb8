use quick_xml::events::Event;
use quick_xml::Reader;

use super::{join, Source};
use crate::models::{Library, LibraryType};

pub const DEFAULT_URL: &str = "https://repo1.maven.org/maven2/";

/// Maven Central; the namespace is the groupId and the name the artifactId.
pub struct MavenCentral {
    base_url: String,
}

impl MavenCentral {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for MavenCentral {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl Source for MavenCentral {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn library_type(&self) -> LibraryType {
        LibraryType::Maven
    }

    fn url(&self, library: &Library) -> Option<String> {
        let group_id = library.namespace.trim();
        let artifact_id = library.name.trim();
        let version = library.version.trim();
        if group_id.is_empty() || artifact_id.is_empty() || version.is_empty() {
            return None;
        }
        let group_path = group_id.replace('.', "/");
        Some(join(
            &self.base_url,
            &format!("{group_path}/{artifact_id}/{version}/{artifact_id}-{version}.pom"),
        ))
    }

    fn extract_license(&self, payload: &str) -> Result<Option<String>, String> {
        extract_license_from_pom(payload)
    }
}

/// First `<licenses><license><name>` of a POM.
///
/// Licences declared by a parent POM are not followed.
fn extract_license_from_pom(xml: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_licenses = false;
    let mut in_license = false;
    let mut in_name = false;
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                seen_root = true;
                match e.name().local_name().as_ref() {
                    b"licenses" => in_licenses = true,
                    b"license" if in_licenses => in_license = true,
                    b"name" if in_license => in_name = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(_)) => seen_root = true,
            Ok(Event::Text(ref e)) if in_name => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                let text = text.trim();
                if !text.is_empty() {
                    return Ok(Some(text.to_string()));
                }
            }
            Ok(Event::End(ref e)) => match e.name().local_name().as_ref() {
                b"name" => in_name = false,
                b"license" => in_license = false,
                b"licenses" => in_licenses = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if seen_root {
        Ok(None)
    } else {
        Err("payload is not an XML document".to_string())
    }
}
