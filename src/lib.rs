//! `license-ledger` — track licence compliance of project dependencies.
//!
//! # Layout
//! - [`models`]: licences, conflicts, risks, libraries, projects and their dependencies.
//! - [`store`]: transactional in-memory graph with JSON snapshots.
//! - [`conflict`]: the licence compatibility matrix.
//! - [`license`]: SPDX expression linking and risk derivation.
//! - [`dependency`]: per-project set algebra, distributions and statistics.
//! - [`registry`] / [`pipeline`]: registry lookups chained into the enrichment pipeline.
//! - [`query`]: criteria queries over the four row types.
//! - [`report`]: terminal rendering of the above.

pub mod config;
pub mod conflict;
pub mod dependency;
pub mod error;
pub mod license;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod report;
pub mod store;

pub use error::{Error, Result};
