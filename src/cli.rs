use std::path::PathBuf;

use clap::{Parser, Subcommand};

use license_ledger::models::LibraryType;

#[derive(Parser, Debug)]
#[command(
    name = "license-ledger",
    about = "Track licence compliance of project dependencies",
    version
)]
pub struct Cli {
    /// Snapshot file holding the stored data [default: ./license-ledger.json]
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Config file [default: ./.license-ledger/config.toml, fallback ~/.config/license-ledger/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "terminal", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print summary lines
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up missing licences in package registries
    Enrich {
        /// Only enrich libraries of this type (repeatable)
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<LibraryTypeArg>,

        /// Concurrent lookups per batch [default: from config]
        #[arg(long)]
        batch_size: Option<usize>,

        /// Append failed lookups to the library error log
        #[arg(long)]
        record_errors: bool,
    },

    /// Licence distribution, review state and risk of a project
    Report {
        /// Project id
        project: u64,
    },

    /// Libraries added and removed between two project versions
    Compare {
        /// Project id of the newer version
        first: u64,
        /// Project id of the older version
        second: u64,
    },

    /// Conflicts recorded for a licence, or the compatibility of a pair
    Conflicts {
        /// Short or SPDX identifier
        license: String,

        /// Check this licence against `license` instead of listing
        #[arg(long = "with", value_name = "LICENSE")]
        other: Option<String>,

        /// Only list incompatible licences
        #[arg(long)]
        incompatible: bool,
    },

    /// Run criteria like `name.contains=lodash` against stored rows
    Query {
        entity: QueryEntity,

        /// `field.operator=value` conditions, and optionally `distinct=true`
        criteria: Vec<String>,

        /// Only print the number of matching rows
        #[arg(long)]
        count: bool,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: usize,

        #[arg(long, default_value_t = 50)]
        page_size: usize,
    },

    /// Remove dependencies from a project
    Purge {
        /// Project id
        project: u64,

        /// Keep manually added dependencies
        #[arg(long)]
        keep_manual: bool,
    },

    /// Create the next version of a project
    NextVersion {
        /// Project id of the base version
        project: u64,

        version: String,

        /// Mark the base version as delivered
        #[arg(long)]
        delivered: bool,

        /// Copy manually added dependencies to the new version
        #[arg(long)]
        copy_manual: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum QueryEntity {
    Dependency,
    Library,
    License,
    Project,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum LibraryTypeArg {
    Npm,
    Maven,
    Pypi,
    Cargo,
    Nuget,
    Generic,
}

impl From<&LibraryTypeArg> for LibraryType {
    fn from(arg: &LibraryTypeArg) -> Self {
        match arg {
            LibraryTypeArg::Npm => LibraryType::Npm,
            LibraryTypeArg::Maven => LibraryType::Maven,
            LibraryTypeArg::Pypi => LibraryType::Pypi,
            LibraryTypeArg::Cargo => LibraryType::Cargo,
            LibraryTypeArg::Nuget => LibraryType::Nuget,
            LibraryTypeArg::Generic => LibraryType::Generic,
        }
    }
}
