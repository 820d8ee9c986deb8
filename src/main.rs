//! `license-ledger` CLI.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and initialise logging.
//! 2. Load config ([`license_ledger::config::load_config`]) and open the snapshot ([`license_ledger::store::Store::open`]).
//! 3. Run the subcommand against the store.
//! 4. Write the snapshot back when the command changed it.
//!
//! `conflicts --with` exits `1` when the two licences are incompatible.

mod cli;

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;

use cli::{Cli, Command, OutputFormat, QueryEntity};
use license_ledger::config::{load_config, Config};
use license_ledger::conflict::ConflictMatrix;
use license_ledger::dependency::{self, compare};
use license_ledger::license;
use license_ledger::models::{CompatibilityState, LibraryId, LibraryType, License, LicenseId, ProjectId};
use license_ledger::pipeline::{enrich_libraries, BatchOptions, Cancellation, Pipeline};
use license_ledger::query::{
    Criteria, Dependencies, Libraries, Licenses, Paginated, Projects, Target,
};
use license_ledger::registry::{HttpRegistry, RegistryClient};
use license_ledger::report::terminal::{self, Tabular};
use license_ledger::report::{ConflictReport, ProjectReport};
use license_ledger::store::{default_snapshot_path, Graph, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cwd = std::env::current_dir().context("Failed to resolve the working directory")?;
    let config = load_config(&cwd, cli.config.as_deref())?;
    let snapshot = cli
        .snapshot
        .clone()
        .unwrap_or_else(|| default_snapshot_path(&cwd));
    let store = Store::open(&snapshot)?;

    let changed = match &cli.command {
        Command::Enrich {
            types,
            batch_size,
            record_errors,
        } => {
            let types: Vec<LibraryType> = types.iter().map(Into::into).collect();
            if let Err(e) = enrich(&cli, &config, &store, &types, *batch_size, *record_errors).await {
                // chunks committed before the failure still reach the snapshot
                save(&store, &snapshot)?;
                return Err(e);
            }
            true
        }
        Command::Report { project } => {
            let graph = store.read()?;
            let report = ProjectReport::build(&graph, ProjectId(*project))?;
            match cli.format {
                OutputFormat::Terminal => terminal::render_project(&report, cli.verbose > 0, cli.quiet),
                OutputFormat::Json => print_json(&report)?,
            }
            false
        }
        Command::Compare { first, second } => {
            let graph = store.read()?;
            let (first, second) = (ProjectId(*first), ProjectId(*second));
            let first_project = graph
                .project(first)
                .ok_or_else(|| anyhow!("Project {first} does not exist"))?;
            let second_project = graph
                .project(second)
                .ok_or_else(|| anyhow!("Project {second} does not exist"))?;
            let view = compare(&graph, first, second);
            match cli.format {
                OutputFormat::Terminal => {
                    terminal::render_difference(first_project, second_project, &view, cli.verbose > 0)
                }
                OutputFormat::Json => print_json(&view)?,
            }
            false
        }
        Command::Conflicts {
            license: name,
            other,
            incompatible,
        } => {
            let graph = store.read()?;
            let first = find_license(&graph, name)?;
            match other {
                Some(other) => {
                    let second = find_license(&graph, other)?;
                    let state = ConflictMatrix::new(&graph).compatibility(first, second);
                    match cli.format {
                        OutputFormat::Terminal => terminal::render_pair(
                            license_of(&graph, first)?,
                            license_of(&graph, second)?,
                            state,
                        ),
                        OutputFormat::Json => print_json(&serde_json::json!({ "compatibility": state }))?,
                    }
                    if state == CompatibilityState::Incompatible {
                        std::process::exit(1);
                    }
                }
                None => {
                    let report = ConflictReport::build(&graph, first, *incompatible)?;
                    match cli.format {
                        OutputFormat::Terminal => terminal::render_conflicts(&report),
                        OutputFormat::Json => print_json(&report)?,
                    }
                }
            }
            false
        }
        Command::Query {
            entity,
            criteria,
            count,
            page,
            page_size,
        } => {
            let criteria = Criteria::parse(criteria)?;
            let paginated = Paginated {
                page_size: NonZeroUsize::new(*page_size)
                    .ok_or_else(|| anyhow!("--page-size must be at least 1"))?,
                page: *page,
            };
            let graph = store.read()?;
            let format = cli.format;
            match entity {
                QueryEntity::Dependency => {
                    query::<Dependencies>(&graph, &criteria, paginated, *count, format)?
                }
                QueryEntity::Library => query::<Libraries>(&graph, &criteria, paginated, *count, format)?,
                QueryEntity::License => query::<Licenses>(&graph, &criteria, paginated, *count, format)?,
                QueryEntity::Project => query::<Projects>(&graph, &criteria, paginated, *count, format)?,
            }
            false
        }
        Command::Purge {
            project,
            keep_manual,
        } => {
            let removed = dependency::purge_dependencies(&store, ProjectId(*project), *keep_manual)?;
            if !cli.quiet {
                eprintln!("  {} removed {} dependencies", "→".cyan(), removed);
            }
            true
        }
        Command::NextVersion {
            project,
            version,
            delivered,
            copy_manual,
        } => {
            let id = dependency::create_next_version(
                &store,
                ProjectId(*project),
                version,
                *delivered,
                *copy_manual,
            )?;
            if !cli.quiet {
                eprintln!("  {} created project {}", "→".cyan(), id);
            }
            true
        }
    };

    if changed {
        save(&store, &snapshot)?;
    }
    Ok(())
}

fn save(store: &Store, path: &Path) -> Result<()> {
    store
        .save(path)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find_license(graph: &Graph, identifier: &str) -> Result<LicenseId> {
    license::resolve(graph, identifier).ok_or_else(|| anyhow!("Unknown license '{identifier}'"))
}

fn license_of(graph: &Graph, id: LicenseId) -> Result<&License> {
    graph
        .license(id)
        .ok_or_else(|| anyhow!("License {id} does not exist"))
}

fn query<T>(
    graph: &Graph,
    criteria: &Criteria,
    paginated: Paginated,
    count: bool,
    format: OutputFormat,
) -> Result<()>
where
    T: Target,
    T::Item: Tabular + Serialize,
{
    let spec = criteria.build::<T>()?;
    if count {
        let count = spec.count(graph);
        match format {
            OutputFormat::Terminal => println!("{count}"),
            OutputFormat::Json => print_json(&serde_json::json!({ "count": count }))?,
        }
        return Ok(());
    }
    let page = spec.page(graph, paginated);
    match format {
        OutputFormat::Terminal => terminal::render_rows(graph, &page),
        OutputFormat::Json => print_json(&page)?,
    }
    Ok(())
}

async fn enrich(
    cli: &Cli,
    config: &Config,
    store: &Store,
    types: &[LibraryType],
    batch_size: Option<usize>,
    record_errors: bool,
) -> Result<()> {
    let client: Arc<dyn RegistryClient> = Arc::new(HttpRegistry::new(&config.registry)?);
    let pipeline = Pipeline::with_registries(&config.registry, client)
        .record_errors(record_errors || config.enrichment.record_errors);

    let types: Vec<LibraryType> = if types.is_empty() {
        pipeline.library_types().collect()
    } else {
        types.to_vec()
    };
    let ids: Vec<LibraryId> = store
        .read()?
        .libraries()
        .filter(|l| types.contains(&l.library_type))
        .filter(|l| !l.has_original_license())
        .filter_map(|l| l.id)
        .collect();
    info!("{} libraries without an original license", ids.len());

    let cancel = Cancellation::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let show_progress = !cli.quiet && cli.format == OutputFormat::Terminal;
    let pb = if show_progress {
        let pb = ProgressBar::new(ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let options = BatchOptions {
        batch_size: batch_size.unwrap_or(config.enrichment.batch_size),
    };
    let summary = enrich_libraries(store, &pipeline, &ids, &options, &cancel, pb.as_ref()).await?;

    if let Some(pb) = pb {
        pb.finish_with_message(if summary.cancelled { "Cancelled" } else { "Done" });
    }
    match cli.format {
        OutputFormat::Terminal => terminal::render_enrichment(&summary),
        OutputFormat::Json => print_json(&summary)?,
    }
    Ok(())
}
