use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Notify;

use super::Pipeline;
use crate::conflict::ConflictMatrix;
use crate::error::Result;
use crate::license;
use crate::models::{Library, LibraryId};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { batch_size: 75 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable handle used to stop a running batch.
#[derive(Clone, Default)]
pub struct Cancellation {
    state: Arc<CancelState>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`Cancellation::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            // registered before the flag is read, so a concurrent cancel is not lost
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn changed(before: &Library, after: &Library) -> bool {
    before.original_license != after.original_license
        || before.error_logs.len() != after.error_logs.len()
}

/// Carry what a run found over to the library as it is stored now.
///
/// The licence is only filled when it is still blank; error log entries the
/// run added are appended. Returns whether `stored` changed.
fn merge_outcome(stored: &mut Library, before: &Library, after: Library) -> bool {
    let mut merged = false;
    if !stored.has_original_license() && after.has_original_license() {
        stored.original_license = after.original_license;
        merged = true;
    }
    for log in after.error_logs {
        if before.contains_error_log(&log.summary()) || stored.contains_error_log(&log.summary()) {
            continue;
        }
        stored.error_logs.push(log);
        merged = true;
    }
    merged
}

/// Enrich stored libraries chunk by chunk.
///
/// Libraries within a chunk run concurrently. Each finished chunk is
/// committed before the next starts, so cancelling keeps everything written
/// so far; an interrupted chunk writes nothing.
///
/// Results are merged into the libraries as stored at commit time, so edits
/// made while lookups were running survive. Libraries removed in the meantime
/// are skipped.
pub async fn enrich_libraries(
    store: &Store,
    pipeline: &Pipeline,
    ids: &[LibraryId],
    options: &BatchOptions,
    cancel: &Cancellation,
    progress: Option<&ProgressBar>,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for chunk in ids.chunks(options.batch_size.max(1)) {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let libraries: Vec<Library> = {
            let graph = store.read()?;
            chunk
                .iter()
                .filter_map(|id| graph.library(*id).cloned())
                .collect()
        };

        let runs = join_all(libraries.iter().cloned().map(|l| pipeline.run(l)));
        let outcomes = tokio::select! {
            outcomes = runs => outcomes,
            _ = cancel.cancelled() => {
                warn!("Enrichment cancelled after {} libraries", summary.processed);
                summary.cancelled = true;
                break;
            }
        };

        let mut updates = Vec::new();
        for (before, outcome) in libraries.into_iter().zip(outcomes) {
            summary.processed += 1;
            if !outcome.failures.is_empty() {
                summary.failed += 1;
            }
            if changed(&before, &outcome.library) {
                updates.push((before, outcome.library));
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        summary.updated += store.transaction(move |graph| {
            let mut updated = 0;
            for (before, after) in updates {
                let Some(mut stored) = before.id.and_then(|id| graph.library(id)).cloned() else {
                    warn!("Library {before} was removed during enrichment, skipping");
                    continue;
                };
                if !merge_outcome(&mut stored, &before, after) {
                    continue;
                }
                license::autocomplete(graph, &mut stored);
                ConflictMatrix::new(graph).cross_check(&mut stored);
                match graph.update_library(stored) {
                    Ok(()) => updated += 1,
                    Err(e) => warn!("Could not store enrichment of {before}: {e}"),
                }
            }
            Ok(updated)
        })?;
    }

    info!(
        "Enriched {} libraries: {} updated, {} with failures",
        summary.processed, summary.updated, summary.failed
    );
    Ok(summary)
}
