//! Per-file outcomes and the batch report.

use serde::Serialize;

use crate::ai::TokenUsage;
use crate::billing::{CostEstimate, ModelRates};

/// Terminal state of one file in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Renamed { final_name: String },
    DuplicateRemoved { matched_existing: String },
    Unchanged,
    ValidationFailed { reason: String },
    ExtractionFailed { reason: String },
    GenerationFailed { reason: String },
    ResolutionFailed { reason: String },
}

impl ResolutionOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. }
                | Self::ExtractionFailed { .. }
                | Self::GenerationFailed { .. }
                | Self::ResolutionFailed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Renamed { .. } => "renamed",
            Self::DuplicateRemoved { .. } => "duplicate removed",
            Self::Unchanged => "unchanged",
            Self::ValidationFailed { .. } => "validation failed",
            Self::ExtractionFailed { .. } => "extraction failed",
            Self::GenerationFailed { .. } => "generation failed",
            Self::ResolutionFailed { .. } => "resolution failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::ValidationFailed { reason }
            | Self::ExtractionFailed { reason }
            | Self::GenerationFailed { reason }
            | Self::ResolutionFailed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Counters per outcome kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub renamed: usize,
    pub duplicates_removed: usize,
    pub unchanged: usize,
    pub validation_failed: usize,
    pub extraction_failed: usize,
    pub generation_failed: usize,
    pub resolution_failed: usize,
}

impl OutcomeCounts {
    pub fn errors(&self) -> usize {
        self.validation_failed + self.extraction_failed + self.generation_failed + self.resolution_failed
    }

    pub fn total(&self) -> usize {
        self.renamed + self.duplicates_removed + self.unchanged + self.errors()
    }
}

/// Cost accumulated from live calls. Best effort: endpoints may omit usage.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    /// Successful calls whose usage had to be estimated
    pub calls_without_usage: usize,
    pub source: String,
}

impl ActualCost {
    /// Add one successful call; `estimated_input` fills in missing usage
    pub fn record(&mut self, usage: Option<TokenUsage>, estimated_input: u64, estimated_output: u64, rates: &ModelRates) {
        let (input, output) = match usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens),
            None => {
                self.calls_without_usage += 1;
                (estimated_input, estimated_output)
            }
        };

        let quote = rates.quote(input, output);
        self.input_tokens += input;
        self.output_tokens += output;
        self.cost_usd += quote.total_cost;
        self.source = quote.source;
    }

    pub fn is_partial(&self) -> bool {
        self.calls_without_usage > 0
    }
}

/// A file that ended in an error outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub file: String,
    pub category: &'static str,
    pub reason: String,
}

/// Summary of one batch run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: String,
    pub files_total: usize,
    pub counts: OutcomeCounts,
    pub estimate: Option<CostEstimate>,
    pub actual: ActualCost,
    pub interrupted: bool,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn new(run_id: impl Into<String>, files_total: usize, estimate: Option<CostEstimate>) -> Self {
        Self {
            run_id: run_id.into(),
            files_total,
            estimate,
            ..Default::default()
        }
    }

    pub fn record(&mut self, file: &str, outcome: &ResolutionOutcome) {
        let counts = &mut self.counts;
        match outcome {
            ResolutionOutcome::Renamed { .. } => counts.renamed += 1,
            ResolutionOutcome::DuplicateRemoved { .. } => counts.duplicates_removed += 1,
            ResolutionOutcome::Unchanged => counts.unchanged += 1,
            ResolutionOutcome::ValidationFailed { .. } => counts.validation_failed += 1,
            ResolutionOutcome::ExtractionFailed { .. } => counts.extraction_failed += 1,
            ResolutionOutcome::GenerationFailed { .. } => counts.generation_failed += 1,
            ResolutionOutcome::ResolutionFailed { .. } => counts.resolution_failed += 1,
        }

        if let Some(reason) = outcome.reason() {
            self.failures.push(FileFailure {
                file: file.to_string(),
                category: outcome.label(),
                reason: reason.to_string(),
            });
        }
    }

    pub fn files_processed(&self) -> usize {
        self.counts.total()
    }

    pub fn has_errors(&self) -> bool {
        self.counts.errors() > 0
    }

    /// 0 clean, 2 partial failure, 130 interrupted
    pub fn exit_code(&self) -> u8 {
        if self.interrupted {
            130
        } else if self.has_errors() {
            2
        } else {
            0
        }
    }
}
