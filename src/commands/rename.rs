//! `rename`: estimate, confirm, then run the batch.

use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use dialoguer::Confirm;
use uuid::Uuid;

use crate::ai::credentials::{CredentialManager, PROVIDER};
use crate::ai::{OpenAiClient, PromptAssembler};
use crate::billing::{resolve_rates, CostEstimate, CostEstimator};
use crate::config::RenameConfig;
use crate::error::RenameError;
use crate::extract::ContentExtractor;
use crate::history::RenameLog;
use crate::quarantine::QuarantineManager;
use crate::rename::{
    scan_directory, AbortFlag, BatchOrchestrator, BatchReport, CollisionResolver, DuplicateSink,
    ResolutionOutcome,
};

use super::RenameArgs;

/// Environment and `.env` settings overlaid with command line flags
pub fn build_config(args: &RenameArgs) -> Result<RenameConfig, RenameError> {
    let mut config = RenameConfig::from_env()?;

    if let Some(model) = &args.model {
        config.model = model.trim().to_string();
    }
    if let Some(window) = args.window {
        config.window_capacity = window;
    }
    if args.max_cost.is_some() {
        config.max_cost_usd = args.max_cost;
    }
    if args.trash {
        config.use_system_trash = true;
    }
    if args.no_log {
        config.log_file = None;
    }
    if args.offline_pricing {
        config.offline_pricing = true;
    }

    config.validate()?;
    Ok(config)
}

pub async fn run_rename(args: RenameArgs) -> Result<u8, RenameError> {
    run_rename_with(args, |non_interactive| {
        CredentialManager::resolve_api_key(PROVIDER, non_interactive)
    })
    .await
}

/// `resolve_key` receives the non-interactive flag and yields the API key
async fn run_rename_with<K>(args: RenameArgs, resolve_key: K) -> Result<u8, RenameError>
where
    K: FnOnce(bool) -> Result<String, String>,
{
    let config = build_config(&args)?;

    let directory = args.directory.canonicalize().map_err(|e| {
        RenameError::fatal(format!("Cannot open {}: {}", args.directory.display(), e))
    })?;
    if !directory.is_dir() {
        return Err(RenameError::fatal(format!(
            "{} is not a directory",
            directory.display()
        )));
    }

    // Prerequisites are settled before any file is touched
    let api_key = if args.dry_run {
        None
    } else {
        let key = resolve_key(args.non_interactive)
            .map_err(|e| RenameError::fatal(format!("No API key available: {}", e)))?;
        Some(key)
    };

    let files = scan_directory(&directory)?;
    if files.is_empty() {
        println!("No files to rename in {}", directory.display());
        return Ok(0);
    }

    let assembler = PromptAssembler::new(args.instruction.as_deref());
    let extractor = ContentExtractor::new(config.excerpt_chars, config.pdf_pages);

    let pricing_url = (!config.offline_pricing).then_some(config.pricing_url.as_str());
    let rates = resolve_rates(&config.model, pricing_url).await;
    let estimate =
        CostEstimator::new(&assembler, &extractor, config.window_capacity).estimate(&files, &rates);

    if args.json && args.dry_run {
        print_json(&estimate)?;
    } else if !args.json {
        print_estimate(&estimate);
    }

    let Some(api_key) = api_key else {
        return Ok(0);
    };

    check_budget(&estimate, config.max_cost_usd)?;

    if !(args.yes || args.non_interactive) && !confirm(files.len())? {
        println!("Cancelled, no files were changed.");
        return Ok(0);
    }

    let run_id = Uuid::new_v4().to_string();
    let log = match &config.log_file {
        Some(path) => Some(RenameLog::open(path.clone(), &run_id).map_err(RenameError::Fatal)?),
        None => None,
    };

    let client = OpenAiClient::new(
        &config.api_base_url,
        api_key,
        &config.model,
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(RenameError::Fatal)?;

    let sink = if config.use_system_trash {
        DuplicateSink::SystemTrash
    } else {
        DuplicateSink::Quarantine(QuarantineManager::with_config(
            config.quarantine_dir.clone(),
            config.quarantine_retention_days,
        ))
    };
    let resolver = CollisionResolver::new(sink, config.max_suffix_attempts);

    let abort = AbortFlag::default();
    let handler = install_interrupt_handler(abort.clone());

    let mut orchestrator = BatchOrchestrator::new(
        &client,
        &assembler,
        &extractor,
        &resolver,
        &rates,
        config.window_capacity,
    )
    .with_abort_flag(abort);
    if let Some(log) = &log {
        orchestrator = orchestrator.with_log(log);
    }

    tracing::info!(
        "[Rename] Run {} on {} with model {}",
        run_id,
        directory.display(),
        client.model()
    );

    let json = args.json;
    let report = orchestrator
        .run(&files, &run_id, Some(estimate), |entry, outcome| {
            if !json {
                print_outcome(entry.name(), outcome);
            }
        })
        .await;

    handler.abort();

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report, log.as_ref().map(|l| l.path()), resolver.sink());
    }

    Ok(report.exit_code())
}

/// The estimate must stay within `max_cost_usd` when one is set
fn check_budget(estimate: &CostEstimate, max_cost_usd: Option<f64>) -> Result<(), RenameError> {
    match max_cost_usd {
        Some(budget) if estimate.total_cost > budget => Err(RenameError::fatal(format!(
            "Estimated cost ${:.4} exceeds the budget of ${:.4}",
            estimate.total_cost, budget
        ))),
        _ => Ok(()),
    }
}

fn confirm(file_count: usize) -> Result<bool, RenameError> {
    Confirm::new()
        .with_prompt(format!("Rename {} files?", file_count))
        .default(false)
        .interact()
        .map_err(|e| RenameError::fatal(format!("Confirmation prompt failed: {}", e)))
}

fn install_interrupt_handler(abort: AbortFlag) -> tokio::task::JoinHandle<()> {
    tokio::spawn(watch_interrupts(abort, tokio::signal::ctrl_c, || {
        std::process::exit(130)
    }))
}

/// First signal stops the batch after the current file; a second one calls `exit`
async fn watch_interrupts<S, F, X>(abort: AbortFlag, mut next_signal: S, exit: X)
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
    X: FnOnce(),
{
    if next_signal().await.is_err() {
        return;
    }
    eprintln!("\nInterrupted, stopping after the current file (Ctrl-C again to quit)...");
    abort.set();

    if next_signal().await.is_ok() {
        eprintln!("\nInterrupted again, exiting");
        exit();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), RenameError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RenameError::fatal(format!("Failed to serialize summary: {}", e)))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    Ok(())
}

fn print_estimate(estimate: &CostEstimate) {
    println!("Cost estimate ({}, pricing: {})", estimate.model, estimate.source);
    println!(
        "  files:  {} to send, {} skipped as unsupported",
        estimate.files_billable, estimate.files_skipped
    );
    println!(
        "  tokens: ~{} input, ~{} output",
        estimate.input_tokens, estimate.output_tokens
    );
    println!("  cost:   ~${:.4}", estimate.total_cost);
}

fn print_outcome(name: &str, outcome: &ResolutionOutcome) {
    match outcome {
        ResolutionOutcome::Renamed { final_name } => println!("  {} -> {}", name, final_name),
        ResolutionOutcome::DuplicateRemoved { matched_existing } => {
            println!("  {} duplicates {}, moved aside", name, matched_existing)
        }
        ResolutionOutcome::Unchanged => println!("  {} unchanged", name),
        other => println!(
            "  {} skipped ({}: {})",
            name,
            other.label(),
            other.reason().unwrap_or_default()
        ),
    }
}

fn print_summary(report: &BatchReport, log_path: Option<&Path>, sink: &DuplicateSink) {
    let counts = &report.counts;

    println!();
    if report.interrupted {
        println!(
            "Interrupted after {} of {} files",
            report.files_processed(),
            report.files_total
        );
    }
    println!("Run {}", report.run_id);
    println!("  renamed:            {}", counts.renamed);
    println!("  duplicates removed: {}", counts.duplicates_removed);
    println!("  unchanged:          {}", counts.unchanged);
    println!("  errors:             {}", counts.errors());

    for failure in &report.failures {
        println!("    {} [{}] {}", failure.file, failure.category, failure.reason);
    }

    if let Some(estimate) = &report.estimate {
        println!(
            "  estimated cost:     ${:.4} ({})",
            estimate.total_cost, estimate.source
        );
    }
    let partial = if report.actual.is_partial() {
        format!(", {} calls without usage data", report.actual.calls_without_usage)
    } else {
        String::new()
    };
    println!(
        "  actual cost:        ${:.4} ({} input / {} output tokens{})",
        report.actual.cost_usd, report.actual.input_tokens, report.actual.output_tokens, partial
    );

    if counts.duplicates_removed > 0 {
        println!("  duplicates are in the {}", sink.describe());
    }
    if let Some(path) = log_path {
        println!("  history: {}", path.display());
    }
}
