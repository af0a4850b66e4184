//! Pre-flight cost estimation.
//!
//! The dry pass walks the same file list the live batch will, extracts each
//! excerpt and builds the request through the shared [`PromptAssembler`].
//! No generation calls and no filesystem mutations happen here.

use serde::Serialize;

use crate::ai::{GenerationRequest, PromptAssembler};
use crate::extract::ContentExtractor;
use crate::rename::entry::FileEntry;
use crate::rename::tracker::ConsistencyTracker;

use super::pricing::ModelRates;

/// Conservative characters per token
pub const CHARS_PER_TOKEN: f64 = 3.0;

/// Added on top of the raw token estimate
pub const TOKEN_SAFETY_MARGIN: f64 = 0.10;

/// Output tokens budgeted per request (matches the request's `max_tokens`)
pub const OUTPUT_TOKEN_ALLOWANCE: u64 = 30;

/// Applied to the final dollar figure
pub const COST_SAFETY_MULTIPLIER: f64 = 1.2;

/// Estimated input tokens for a prompt of `char_count` characters
pub fn estimate_input_tokens(char_count: usize) -> u64 {
    ((char_count as f64 / CHARS_PER_TOKEN) * (1.0 + TOKEN_SAFETY_MARGIN)).ceil() as u64
}

/// Estimated input tokens for an assembled request
pub fn estimate_request_tokens(request: &GenerationRequest) -> u64 {
    estimate_input_tokens(request.char_count())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub files_total: usize,
    /// Files that would reach the generator
    pub files_billable: usize,
    /// Files the extractor rejects; they cost nothing
    pub files_skipped: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub model: String,
    pub source: String,
}

pub struct CostEstimator<'a> {
    assembler: &'a PromptAssembler,
    extractor: &'a ContentExtractor,
    window_capacity: usize,
}

impl<'a> CostEstimator<'a> {
    pub fn new(assembler: &'a PromptAssembler, extractor: &'a ContentExtractor, window_capacity: usize) -> Self {
        Self {
            assembler,
            extractor,
            window_capacity,
        }
    }

    /// Dry pass over `files` in batch order.
    ///
    /// Real renames are unknown before the live pass, so the consistency
    /// window is filled with (original, original) pairs. The example lines
    /// then have roughly the length the real ones will have.
    pub fn estimate(&self, files: &[FileEntry], rates: &ModelRates) -> CostEstimate {
        let mut tracker = ConsistencyTracker::new(self.window_capacity);
        let mut estimate = CostEstimate {
            files_total: files.len(),
            model: rates.model.clone(),
            ..Default::default()
        };

        for entry in files {
            let excerpt = match self.extractor.extract(entry) {
                Ok(excerpt) => excerpt,
                Err(e) => {
                    tracing::debug!("[Estimator] Skipping {}: {}", entry.name(), e);
                    estimate.files_skipped += 1;
                    continue;
                }
            };

            let request = self
                .assembler
                .assemble(&tracker.snapshot(), entry.name(), &excerpt.text);

            estimate.input_tokens += estimate_request_tokens(&request);
            estimate.output_tokens += OUTPUT_TOKEN_ALLOWANCE;
            estimate.files_billable += 1;

            tracker.record(entry.name(), entry.name());
        }

        let quote = rates.quote(estimate.input_tokens, estimate.output_tokens);
        estimate.input_cost = quote.input_cost * COST_SAFETY_MULTIPLIER;
        estimate.output_cost = quote.output_cost * COST_SAFETY_MULTIPLIER;
        estimate.total_cost = quote.total_cost * COST_SAFETY_MULTIPLIER;
        estimate.source = quote.source;

        tracing::info!(
            "[Estimator] {} billable of {} files, ~{} input / {} output tokens, ${:.4} ({})",
            estimate.files_billable,
            estimate.files_total,
            estimate.input_tokens,
            estimate.output_tokens,
            estimate.total_cost,
            estimate.source
        );

        estimate
    }
}
