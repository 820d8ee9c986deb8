use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};

use super::{Step, StepError};
use crate::license::spdx::strip_parentheses;
use crate::models::{Library, LibraryType};
use crate::registry::{RegistryClient, RegistryError, RegistryResponse, Source};

/// Looks up the licence of a library in the registry described by `S`.
pub struct RegistryStep<S> {
    name: String,
    source: S,
    client: Arc<dyn RegistryClient>,
}

impl<S: Source> RegistryStep<S> {
    pub fn new(source: S, client: Arc<dyn RegistryClient>) -> Self {
        Self {
            name: format!("{}-license", source.library_type()),
            source,
            client,
        }
    }
}

#[async_trait]
impl<S: Source> Step for RegistryStep<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn library_type(&self) -> LibraryType {
        self.source.library_type()
    }

    async fn process(&self, mut input: Library) -> Result<Library, StepError> {
        if !self.applies_to(&input) {
            return Ok(input);
        }
        let base = self.source.base_url();
        let Some(url) = self.source.url(&input) else {
            debug!("Library {input} has no coordinates usable on {base}");
            return Ok(input);
        };
        info!(
            "Searching for license of the {} library : {}",
            input.library_type, input
        );

        let payload = match self.client.get(&url).await {
            Ok(RegistryResponse::Found(payload)) => payload,
            Ok(RegistryResponse::NotFound) => {
                debug!("Library {input} not found on {base}");
                return Ok(input);
            }
            Err(RegistryError::Status { status, .. }) => {
                info!("License for library {input} could not be scraped from {base} : status {status}");
                return Err(StepError::UnexpectedStatus {
                    step: self.name.clone(),
                    status,
                });
            }
            Err(e) => {
                info!("License for library {input} could not be scraped from {base} : {e}");
                return Err(StepError::Transport {
                    step: self.name.clone(),
                    message: e.to_string(),
                });
            }
        };

        match self.source.extract_license(&payload) {
            Ok(Some(license)) => {
                let license = strip_parentheses(&license);
                if !license.is_empty() && !input.has_original_license() {
                    debug!("License found for library {input} : {license}");
                    input.original_license = Some(license);
                }
                Ok(input)
            }
            Ok(None) => {
                debug!("License for library {input} could not be found on {base}.");
                Ok(input)
            }
            Err(message) => {
                error!("License for library {input} could not be scraped from {base} : {message}");
                Err(StepError::MalformedPayload {
                    step: self.name.clone(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;
    use crate::registry::npm::Npm;
    use crate::registry::crates_io::CratesIo;
    use test_log::test;

    fn npm_step(fake: FakeRegistry) -> RegistryStep<Npm> {
        RegistryStep::new(Npm::default(), Arc::new(fake))
    }

    #[test(tokio::test)]
    async fn scoped_package_uses_namespace_in_url() {
        let step = npm_step(FakeRegistry::default().found(
            "https://registry.npmjs.org/@babel/core/7.24.0",
            r#"{"license":{"type":"MIT"}}"#,
        ));
        let library = step
            .process(Library::new(LibraryType::Npm, "@babel", "core", "7.24.0"))
            .await
            .unwrap();
        assert_eq!(library.original_license.as_deref(), Some("MIT"));
    }

    #[test(tokio::test)]
    async fn other_types_are_skipped() {
        let step = npm_step(FakeRegistry::default());
        let library = Library::new(LibraryType::Maven, "org.example", "lib", "1.0");
        assert!(!step.applies_to(&library));
        let out = step.process(library).await.unwrap();
        assert!(out.original_license.is_none());
    }

    #[test(tokio::test)]
    async fn server_errors_are_unexpected_status() {
        let step = RegistryStep::new(
            CratesIo::default(),
            Arc::new(FakeRegistry::default().status("https://crates.io/api/v1/crates/serde/1.0.0", 503)),
        );
        let result = step
            .process(Library::new(LibraryType::Cargo, "", "serde", "1.0.0"))
            .await;
        assert!(matches!(
            result,
            Err(StepError::UnexpectedStatus { status: 503, .. })
        ));
        assert_eq!(step.name(), "cargo-license");
    }

    #[test(tokio::test)]
    async fn blank_license_value_writes_nothing() {
        let step = npm_step(
            FakeRegistry::default().found("https://registry.npmjs.org/empty/1.0.0", r#"{"license":"  "}"#),
        );
        let library = step
            .process(Library::new(LibraryType::Npm, "", "empty", "1.0.0"))
            .await
            .unwrap();
        assert!(library.original_license.is_none());
    }
}
