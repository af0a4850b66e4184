//! The per-file rename loop.
//!
//! Files move through `Scanned -> Extracted -> Generated -> Validated ->
//! Resolved` strictly in scan order. Each stage can end the file with a
//! failure outcome; the loop then moves on to the next file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ai::{GenerationRequest, NameGenerator, PromptAssembler};
use crate::billing::{estimate_request_tokens, CostEstimate, ModelRates, OUTPUT_TOKEN_ALLOWANCE};
use crate::extract::ContentExtractor;
use crate::history::{LogAction, RenameLog, SYSTEM_TRASH_MARKER};
use crate::security::FilenameValidator;

use super::collision::{CollisionResolver, Resolution};
use super::entry::FileEntry;
use super::outcome::{BatchReport, ResolutionOutcome};
use super::tracker::ConsistencyTracker;

/// Abort flag for stopping a batch between files
#[derive(Debug, Clone)]
pub struct AbortFlag(pub Arc<AtomicBool>);

impl Default for AbortFlag {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
}

impl AbortFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything that changes while a batch runs. Owned by one run only.
#[derive(Debug)]
pub struct BatchState {
    pub tracker: ConsistencyTracker,
    pub report: BatchReport,
}

impl BatchState {
    pub fn new(window_capacity: usize, report: BatchReport) -> Self {
        Self {
            tracker: ConsistencyTracker::new(window_capacity),
            report,
        }
    }
}

pub struct BatchOrchestrator<'a> {
    generator: &'a dyn NameGenerator,
    assembler: &'a PromptAssembler,
    extractor: &'a ContentExtractor,
    resolver: &'a CollisionResolver,
    rates: &'a ModelRates,
    log: Option<&'a RenameLog>,
    abort: AbortFlag,
    window_capacity: usize,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        generator: &'a dyn NameGenerator,
        assembler: &'a PromptAssembler,
        extractor: &'a ContentExtractor,
        resolver: &'a CollisionResolver,
        rates: &'a ModelRates,
        window_capacity: usize,
    ) -> Self {
        Self {
            generator,
            assembler,
            extractor,
            resolver,
            rates,
            log: None,
            abort: AbortFlag::default(),
            window_capacity,
        }
    }

    pub fn with_log(mut self, log: &'a RenameLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// Run the whole batch. `on_outcome` sees every file as soon as it is done.
    pub async fn run<F>(
        &self,
        files: &[FileEntry],
        run_id: &str,
        estimate: Option<CostEstimate>,
        mut on_outcome: F,
    ) -> BatchReport
    where
        F: FnMut(&FileEntry, &ResolutionOutcome),
    {
        let report = BatchReport::new(run_id, files.len(), estimate);
        let mut state = BatchState::new(self.window_capacity, report);

        tracing::info!("[Batch] Run {} starting with {} files", run_id, files.len());

        for entry in files {
            if self.abort.is_set() {
                tracing::warn!(
                    "[Batch] Interrupted after {} of {} files",
                    state.report.files_processed(),
                    files.len()
                );
                state.report.interrupted = true;
                break;
            }

            let outcome = self.process_file(entry, &mut state).await;
            match &outcome {
                ResolutionOutcome::Renamed { final_name } => {
                    tracing::info!("[Batch] {} -> {}", entry.name(), final_name)
                }
                other if other.is_error() => tracing::warn!(
                    "[Batch] {}: {} ({})",
                    entry.name(),
                    other.label(),
                    other.reason().unwrap_or_default()
                ),
                other => tracing::info!("[Batch] {}: {}", entry.name(), other.label()),
            }

            state.report.record(entry.name(), &outcome);
            on_outcome(entry, &outcome);
        }

        tracing::info!(
            "[Batch] Run {} finished: {} renamed, {} duplicates, {} errors",
            run_id,
            state.report.counts.renamed,
            state.report.counts.duplicates_removed,
            state.report.counts.errors()
        );

        state.report
    }

    /// One file through every stage
    async fn process_file(&self, entry: &FileEntry, state: &mut BatchState) -> ResolutionOutcome {
        // Extracted
        let excerpt = match self.extractor.extract(entry) {
            Ok(excerpt) => excerpt,
            Err(e) => return ResolutionOutcome::ExtractionFailed { reason: e.to_string() },
        };

        // Generated
        let request = self
            .assembler
            .assemble(&state.tracker.snapshot(), entry.name(), &excerpt.text);
        let candidate = match self.generate(&request, state).await {
            Ok(candidate) => candidate,
            Err(reason) => return ResolutionOutcome::GenerationFailed { reason },
        };

        // Validated
        if let Err(e) = FilenameValidator::validate(&candidate) {
            return ResolutionOutcome::ValidationFailed { reason: e.message };
        }
        let target = CollisionResolver::target_name(&candidate, entry.extension());
        if let Err(e) = FilenameValidator::validate(&target) {
            return ResolutionOutcome::ValidationFailed { reason: e.message };
        }

        // Resolved
        match self.resolver.resolve(entry.path(), &target) {
            Ok(Resolution::Renamed { final_name, new_path }) => {
                state.tracker.record(entry.name(), &final_name);
                self.log_mutation(LogAction::Renamed, entry.path(), &new_path);
                ResolutionOutcome::Renamed { final_name }
            }
            Ok(Resolution::DuplicateRemoved {
                matched_existing,
                moved_to,
                ..
            }) => {
                let to = moved_to.unwrap_or_else(|| SYSTEM_TRASH_MARKER.into());
                self.log_mutation(LogAction::Duplicate, entry.path(), &to);
                ResolutionOutcome::DuplicateRemoved { matched_existing }
            }
            Ok(Resolution::Unchanged) => ResolutionOutcome::Unchanged,
            Err(e) => ResolutionOutcome::ResolutionFailed { reason: e.to_string() },
        }
    }

    /// Single generation call, no retries. Successful calls feed the cost accumulator.
    async fn generate(&self, request: &GenerationRequest, state: &mut BatchState) -> Result<String, String> {
        let generated = self.generator.generate(request).await?;

        state.report.actual.record(
            generated.usage,
            estimate_request_tokens(request),
            OUTPUT_TOKEN_ALLOWANCE,
            self.rates,
        );

        Ok(generated.candidate)
    }

    fn log_mutation(&self, action: LogAction, from: &Path, to: &Path) {
        if let Some(log) = self.log {
            // Mutation is already done; the outcome stands
            if let Err(e) = log.append(action, from, to) {
                tracing::error!("[Batch] {}", e);
            }
        }
    }
}
