//! Enrichment pipeline.
//!
//! A [`Step`] fills in licence metadata for one library from an external
//! source. The [`Pipeline`] is an ordered table of steps keyed by the library
//! type they handle: [`Pipeline::run`] applies every registered step in
//! registration order, [`Pipeline::dispatch`] runs only the step for the
//! library's type.
//!
//! A failing step never fails the run. The library is restored to what it was
//! before that step and, if requested, the failure is appended to its error log.

mod batch;
mod registry_step;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

pub use batch::{enrich_libraries, BatchOptions, BatchSummary, Cancellation};
pub use registry_step::RegistryStep;

use crate::config::RegistryConfig;
use crate::conflict::ConflictMatrix;
use crate::error::{Error, Result};
use crate::license;
use crate::models::{Library, LibraryId, LibraryType, LogSeverity};
use crate::registry::{crates_io::CratesIo, maven::MavenCentral, npm::Npm, pypi::Pypi, RegistryClient};
use crate::store::Store;

/// Issue name of error log entries written for failed steps.
pub const ENRICHMENT_ISSUE: &str = "License Enrichment";

/// Failure of a single step; the library it ran on is left as it was.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{step}: registry unreachable: {message}")]
    Transport { step: String, message: String },

    #[error("{step}: malformed payload: {message}")]
    MalformedPayload { step: String, message: String },

    #[error("{step}: unexpected status {status}")]
    UnexpectedStatus { step: String, status: u16 },
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn library_type(&self) -> LibraryType;

    /// Only libraries of the step's type whose original licence is blank.
    fn applies_to(&self, library: &Library) -> bool {
        library.library_type == self.library_type() && !library.has_original_license()
    }

    /// Return `input`, possibly with `original_license` filled in.
    async fn process(&self, input: Library) -> std::result::Result<Library, StepError>;
}

/// What a run did to one library.
#[derive(Debug)]
pub struct Outcome {
    pub library: Library,
    pub failures: Vec<StepError>,
}

#[derive(Default)]
pub struct Pipeline {
    steps: Vec<(LibraryType, Arc<dyn Step>)>,
    record_errors: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry steps for npm, Maven Central, PyPI and crates.io, in that order.
    pub fn with_registries(config: &RegistryConfig, client: Arc<dyn RegistryClient>) -> Self {
        Self::new()
            .register(RegistryStep::new(Npm::new(&config.npm_url), client.clone()))
            .register(RegistryStep::new(MavenCentral::new(&config.maven_url), client.clone()))
            .register(RegistryStep::new(Pypi::new(&config.pypi_url), client.clone()))
            .register(RegistryStep::new(CratesIo::new(&config.crates_url), client))
    }

    pub fn register(mut self, step: impl Step + 'static) -> Self {
        self.steps.push((step.library_type(), Arc::new(step)));
        self
    }

    /// Append failures to the library error log during runs.
    pub fn record_errors(mut self, record: bool) -> Self {
        self.record_errors = record;
        self
    }

    pub fn library_types(&self) -> impl Iterator<Item = LibraryType> + '_ {
        self.steps.iter().map(|(t, _)| *t)
    }

    async fn apply(&self, step: &dyn Step, outcome: &mut Outcome) {
        if !step.applies_to(&outcome.library) {
            return;
        }
        let snapshot = outcome.library.clone();
        let input = std::mem::replace(&mut outcome.library, snapshot);
        match step.process(input).await {
            Ok(library) => outcome.library = library,
            Err(e) => {
                if self.record_errors {
                    outcome
                        .library
                        .add_error_log(ENRICHMENT_ISSUE, e.to_string(), LogSeverity::Low);
                }
                outcome.failures.push(e);
            }
        }
    }

    /// Run every registered step, in order, on `library`.
    pub async fn run(&self, library: Library) -> Outcome {
        let mut outcome = Outcome {
            library,
            failures: Vec::new(),
        };
        for (_, step) in &self.steps {
            self.apply(step.as_ref(), &mut outcome).await;
        }
        outcome
    }

    /// Run the step registered for the library's type.
    ///
    /// A type without a step is a configuration error.
    pub async fn dispatch(&self, library: Library) -> Result<Outcome> {
        let step = self
            .steps
            .iter()
            .find(|(t, _)| *t == library.library_type)
            .map(|(_, s)| s.clone())
            .ok_or(Error::NoStepRegistered(library.library_type))?;
        let mut outcome = Outcome {
            library,
            failures: Vec::new(),
        };
        self.apply(step.as_ref(), &mut outcome).await;
        Ok(outcome)
    }
}

/// Store a new library after enriching and completing it.
///
/// The natural key is checked before any registry is contacted. Derived
/// licence fields and the library risk are filled in, then every pair of its
/// licences is checked against the conflict matrix.
pub async fn save_with_check(store: &Store, pipeline: &Pipeline, library: Library) -> Result<LibraryId> {
    if let Some(existing) = store
        .read()?
        .library_by_coordinates(&library.namespace, &library.name, &library.version)
    {
        return Err(Error::duplicate("library", existing));
    }

    let mut library = pipeline.run(library).await.library;
    store.transaction(move |graph| {
        license::autocomplete(graph, &mut library);
        ConflictMatrix::new(graph).cross_check(&mut library);
        debug!("Saving library {library}");
        graph.create_library(library)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompatibilityState, License, LicenseConflict, Project, Dependency};
    use crate::registry::fake::FakeRegistry;
    use crate::dependency::license_distribution;
    use test_log::test;

    fn pipeline(fake: FakeRegistry) -> (Pipeline, Arc<FakeRegistry>) {
        let fake = Arc::new(fake);
        let client: Arc<dyn RegistryClient> = fake.clone();
        (Pipeline::with_registries(&RegistryConfig::default(), client), fake)
    }

    #[test(tokio::test)]
    async fn enrichment_scenario() {
        let (pipeline, _) = pipeline(
            FakeRegistry::default()
                .found("https://registry.npmjs.org/left-pad/1.3.0", r#"{"license":"(MIT)"}"#),
        );
        let store = Store::default();
        store
            .transaction(|graph| graph.create_license(License::new("MIT", "MIT License")))
            .unwrap();

        let left_pad = save_with_check(
            &store,
            &pipeline,
            Library::new(LibraryType::Npm, "", "left-pad", "1.3.0"),
        )
        .await
        .unwrap();
        let lodash = save_with_check(
            &store,
            &pipeline,
            Library::new(LibraryType::Npm, "", "lodash", "4.17.0").with_original_license("Custom"),
        )
        .await
        .unwrap();

        let project = store
            .transaction(|graph| {
                let id = graph.create_project(Project::new("App", "app", "1.0"))?;
                graph.add_dependency(id, Dependency::new(left_pad))?;
                graph.add_dependency(id, Dependency::new(lodash))?;
                Ok(id)
            })
            .unwrap();

        let graph = store.read().unwrap();
        assert_eq!(
            graph.library(left_pad).unwrap().original_license.as_deref(),
            Some("MIT")
        );
        assert_eq!(
            graph.library(lodash).unwrap().original_license.as_deref(),
            Some("Custom")
        );
        let distribution = license_distribution(&graph, project);
        assert_eq!(distribution.len(), 1);
        assert_eq!(distribution[0].license.short_identifier, "MIT");
        assert_eq!(distribution[0].count, 1);
    }

    #[test(tokio::test)]
    async fn existing_license_is_never_changed() {
        let (pipeline, fake) = pipeline(
            FakeRegistry::default()
                .found("https://registry.npmjs.org/lodash/4.17.0", r#"{"license":"MIT"}"#),
        );
        let library =
            Library::new(LibraryType::Npm, "", "lodash", "4.17.0").with_original_license("BSD-3-Clause");
        let outcome = pipeline.run(library).await;
        assert_eq!(outcome.library.original_license.as_deref(), Some("BSD-3-Clause"));
        assert_eq!(fake.calls(), 0);
    }

    #[test(tokio::test)]
    async fn not_found_is_idempotent() {
        let (pipeline, _) = pipeline(FakeRegistry::default());
        let library = Library::new(LibraryType::Npm, "", "ghost", "0.0.1");
        let once = pipeline.run(library).await;
        assert!(once.failures.is_empty());
        let twice = pipeline.run(once.library.clone()).await;
        assert_eq!(twice.library.original_license, once.library.original_license);
        assert_eq!(twice.library.error_logs, once.library.error_logs);
        assert!(twice.library.original_license.is_none());
    }

    #[test(tokio::test)]
    async fn failures_restore_the_library_and_are_recorded_once() {
        let fake = Arc::new(
            FakeRegistry::default()
                .timeout("https://registry.npmjs.org/slow/1.0.0")
                .found("https://registry.npmjs.org/broken/1.0.0", "<html>"),
        );
        let client: Arc<dyn RegistryClient> = fake.clone();
        let pipeline =
            Pipeline::with_registries(&RegistryConfig::default(), client).record_errors(true);

        let slow = pipeline
            .run(Library::new(LibraryType::Npm, "", "slow", "1.0.0"))
            .await;
        assert!(matches!(slow.failures.as_slice(), [StepError::Transport { .. }]));
        assert!(slow.library.original_license.is_none());
        assert_eq!(slow.library.error_logs.len(), 1);

        let again = pipeline.run(slow.library).await;
        assert_eq!(again.library.error_logs.len(), 1);

        let broken = pipeline
            .run(Library::new(LibraryType::Npm, "", "broken", "1.0.0"))
            .await;
        assert!(matches!(
            broken.failures.as_slice(),
            [StepError::MalformedPayload { .. }]
        ));
        assert!(broken.library.original_license.is_none());
    }

    #[test]
    fn registry_pipeline_covers_four_library_types() {
        let (pipeline, _) = pipeline(FakeRegistry::default());
        assert_eq!(
            pipeline.library_types().collect::<Vec<_>>(),
            vec![
                LibraryType::Npm,
                LibraryType::Maven,
                LibraryType::Pypi,
                LibraryType::Cargo
            ]
        );
    }

    #[test(tokio::test)]
    async fn dispatch_without_step_is_a_configuration_error() {
        let (pipeline, _) = pipeline(FakeRegistry::default());
        let result = pipeline
            .dispatch(Library::new(LibraryType::Nuget, "", "Newtonsoft.Json", "13.0.1"))
            .await;
        assert!(matches!(result, Err(Error::NoStepRegistered(LibraryType::Nuget))));
    }

    #[test(tokio::test)]
    async fn dispatch_runs_the_matching_step() {
        let (pipeline, _) = pipeline(FakeRegistry::default().found(
            "https://repo1.maven.org/maven2/junit/junit/4.13.2/junit-4.13.2.pom",
            "<project><licenses><license><name>EPL-1.0</name></license></licenses></project>",
        ));
        let outcome = pipeline
            .dispatch(Library::new(LibraryType::Maven, "junit", "junit", "4.13.2"))
            .await
            .unwrap();
        assert_eq!(outcome.library.original_license.as_deref(), Some("EPL-1.0"));
    }

    #[test(tokio::test)]
    async fn save_with_check_rejects_duplicates_before_lookup() {
        let (pipeline, fake) = pipeline(FakeRegistry::default());
        let store = Store::default();
        save_with_check(&store, &pipeline, Library::new(LibraryType::Npm, "", "a", "1.0.0"))
            .await
            .unwrap();
        let calls = fake.calls();
        let result =
            save_with_check(&store, &pipeline, Library::new(LibraryType::Npm, "", "A", "1.0.0")).await;
        assert!(matches!(result, Err(Error::Duplicate { .. })));
        assert_eq!(fake.calls(), calls);
    }

    #[test(tokio::test)]
    async fn save_with_check_records_license_conflicts() {
        let (pipeline, _) = pipeline(FakeRegistry::default());
        let store = Store::default();
        store
            .transaction(|graph| {
                let gpl = graph.create_license(License::new("GPL-2.0", "GNU GPL v2"))?;
                let apache = graph.create_license(License::new("Apache-2.0", "Apache License 2.0"))?;
                graph.create_conflict(LicenseConflict::new(
                    gpl,
                    apache,
                    CompatibilityState::Incompatible,
                ))
            })
            .unwrap();

        let id = save_with_check(
            &store,
            &pipeline,
            Library::new(LibraryType::Maven, "org.example", "mixed", "1.0")
                .with_original_license("GPL-2.0 AND Apache-2.0"),
        )
        .await
        .unwrap();

        let graph = store.read().unwrap();
        let library = graph.library(id).unwrap();
        assert_eq!(library.license_to_publish.len(), 2);
        assert!(library.contains_error_log(
            "License Conflict - License GPL-2.0 is incompatible with license Apache-2.0."
        ));
    }
}
