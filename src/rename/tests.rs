//! Batch pipeline tests
//!
//! End-to-end runs of the orchestrator over temp directories with a
//! scripted generator:
//! - rename, duplicate and failure scenarios
//! - consistency window propagation
//! - estimate vs live prompt sizes
//! - logging and undo of a finished run

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::ai::{
    GeneratedName, GenerationError, GenerationRequest, NameGenerator, PromptAssembler, RenameExample,
    TokenUsage,
};
use crate::billing::{estimate_input_tokens, CostEstimator, ModelRates};
use crate::extract::ContentExtractor;
use crate::history::{self, LogAction, RenameLog};
use crate::quarantine::QuarantineManager;
use crate::rename::{
    scan_directory, AbortFlag, BatchOrchestrator, BatchReport, CollisionResolver, DuplicateSink,
    ResolutionOutcome,
};

/// Replies by original filename; unknown names echo the original back
struct ScriptedGenerator {
    replies: HashMap<String, Result<String, GenerationError>>,
    usage: Option<TokenUsage>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(replies: &[(&str, Result<&str, GenerationError>)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), reply.clone().map(str::to_string)))
                .collect(),
            usage: Some(TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 8,
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn without_usage(mut self) -> Self {
        self.usage = None;
        self
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl NameGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedName, GenerationError> {
        self.seen.lock().unwrap().push(request.clone());

        let candidate = match self.replies.get(&request.original_name) {
            Some(reply) => reply.clone()?,
            None => request.original_name.clone(),
        };

        Ok(GeneratedName {
            candidate,
            usage: self.usage,
        })
    }
}

struct Fixture {
    dir: TempDir,
    quarantine: TempDir,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        Self {
            dir,
            quarantine: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn manager(&self) -> QuarantineManager {
        QuarantineManager::with_config(self.quarantine.path().to_path_buf(), 30)
    }

    async fn run(
        &self,
        generator: &ScriptedGenerator,
        log: Option<&RenameLog>,
        abort: AbortFlag,
    ) -> (BatchReport, Vec<(String, ResolutionOutcome)>) {
        self.run_with_attempts(generator, log, abort, 1000).await
    }

    async fn run_with_attempts(
        &self,
        generator: &ScriptedGenerator,
        log: Option<&RenameLog>,
        abort: AbortFlag,
        max_attempts: u32,
    ) -> (BatchReport, Vec<(String, ResolutionOutcome)>) {
        let files = scan_directory(self.dir.path()).unwrap();
        let assembler = PromptAssembler::new(Some("chronological invoice naming"));
        let extractor = ContentExtractor::new(2000, 2);
        let resolver =
            CollisionResolver::new(DuplicateSink::Quarantine(self.manager()), max_attempts);
        let rates = ModelRates::from_table("gpt-4o-mini");

        let mut orchestrator =
            BatchOrchestrator::new(generator, &assembler, &extractor, &resolver, &rates, 5)
                .with_abort_flag(abort);
        if let Some(log) = log {
            orchestrator = orchestrator.with_log(log);
        }

        let mut seen = Vec::new();
        let report = orchestrator
            .run(&files, "test-run", None, |entry, outcome| {
                seen.push((entry.name().to_string(), outcome.clone()))
            })
            .await;
        (report, seen)
    }
}

#[tokio::test]
async fn test_invoice_is_renamed_with_its_extension() {
    let fixture = Fixture::new(&[("invoice.pdf", "ACME Corp Invoice #1234, 2024-03-15")]);
    let generator = ScriptedGenerator::new(&[("invoice.pdf", Ok("2024-03-15_Invoice_ACME_1234"))]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert_eq!(fixture.names(), vec!["2024-03-15_Invoice_ACME_1234.pdf"]);
    assert_eq!(
        outcomes[0].1,
        ResolutionOutcome::Renamed {
            final_name: "2024-03-15_Invoice_ACME_1234.pdf".into()
        }
    );
    assert_eq!(report.counts.renamed, 1);
    assert_eq!(report.counts.duplicates_removed, 0);
    assert_eq!(report.counts.errors(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_identical_second_file_is_moved_aside() {
    let fixture = Fixture::new(&[("a.txt", "quarterly report"), ("b.txt", "quarterly report")]);
    let generator = ScriptedGenerator::new(&[("a.txt", Ok("Report.txt")), ("b.txt", Ok("Report.txt"))]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert_eq!(outcomes[0].1, ResolutionOutcome::Renamed { final_name: "Report.txt".into() });
    assert_eq!(
        outcomes[1].1,
        ResolutionOutcome::DuplicateRemoved {
            matched_existing: "Report.txt".into()
        }
    );
    assert_eq!(fixture.names(), vec!["Report.txt"]);
    assert_eq!(fs::read_to_string(fixture.path("Report.txt")).unwrap(), "quarterly report");

    let quarantined = fixture.manager().list().unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].original_path, fixture.path("b.txt"));
    assert_eq!(report.counts.duplicates_removed, 1);
}

#[tokio::test]
async fn test_distinct_file_with_same_name_gets_suffix() {
    let fixture = Fixture::new(&[("a.txt", "first draft"), ("b.txt", "second draft")]);
    let generator = ScriptedGenerator::new(&[("a.txt", Ok("Draft.txt")), ("b.txt", Ok("Draft.txt"))]);

    let (report, _) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert_eq!(fixture.names(), vec!["Draft.txt", "Draft_1.txt"]);
    assert_eq!(fs::read_to_string(fixture.path("Draft.txt")).unwrap(), "first draft");
    assert_eq!(fs::read_to_string(fixture.path("Draft_1.txt")).unwrap(), "second draft");
    assert_eq!(report.counts.renamed, 2);
}

#[tokio::test]
async fn test_one_timeout_among_five_is_partial_failure() {
    let files: Vec<(String, String)> = (1..=5)
        .map(|i| (format!("f{}.txt", i), format!("document number {}", i)))
        .collect();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
    let fixture = Fixture::new(&borrowed);

    let generator = ScriptedGenerator::new(&[
        ("f1.txt", Ok("Doc_1")),
        ("f2.txt", Ok("Doc_2")),
        ("f3.txt", Err(GenerationError::timeout("no response after 30s"))),
        ("f4.txt", Ok("Doc_4")),
        ("f5.txt", Ok("Doc_5")),
    ]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert_eq!(outcomes.len(), 5);
    assert!(matches!(
        &outcomes[2].1,
        ResolutionOutcome::GenerationFailed { reason } if reason.contains("timeout")
    ));
    assert_eq!(report.counts.renamed, 4);
    assert_eq!(report.counts.generation_failed, 1);
    assert_eq!(report.failures[0].file, "f3.txt");
    assert_eq!(report.exit_code(), 2);
    assert!(fixture.path("f3.txt").exists());
}

#[tokio::test]
async fn test_exhausted_suffixes_skip_file_and_batch_continues() {
    let fixture = Fixture::new(&[
        ("Report.txt", "january figures"),
        ("Report_1.txt", "february figures"),
        ("a.txt", "march figures"),
        ("b.txt", "meeting notes"),
    ]);
    let generator = ScriptedGenerator::new(&[("a.txt", Ok("Report")), ("b.txt", Ok("Notes"))]);

    let (report, outcomes) = fixture
        .run_with_attempts(&generator, None, AbortFlag::default(), 1)
        .await;

    let (name, outcome) = &outcomes[2];
    assert_eq!(name, "a.txt");
    assert!(matches!(outcome, ResolutionOutcome::ResolutionFailed { .. }));
    assert_eq!(outcomes[3].1, ResolutionOutcome::Renamed { final_name: "Notes.txt".into() });

    assert_eq!(report.counts.resolution_failed, 1);
    assert_eq!(report.counts.renamed, 1);
    assert_eq!(report.counts.unchanged, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file, "a.txt");
    assert_eq!(report.failures[0].category, "resolution failed");
    assert_eq!(report.exit_code(), 2);

    assert_eq!(fs::read_to_string(fixture.path("a.txt")).unwrap(), "march figures");
    assert_eq!(fs::read_to_string(fixture.path("Report.txt")).unwrap(), "january figures");
    assert_eq!(fs::read_to_string(fixture.path("Report_1.txt")).unwrap(), "february figures");
}

#[tokio::test]
async fn test_traversal_candidate_never_touches_filesystem() {
    let fixture = Fixture::new(&[("secret.txt", "payload")]);
    let generator = ScriptedGenerator::new(&[("secret.txt", Ok("../escaped.txt"))]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert!(matches!(outcomes[0].1, ResolutionOutcome::ValidationFailed { .. }));
    assert_eq!(fixture.names(), vec!["secret.txt"]);
    assert!(!fixture.dir.path().parent().unwrap().join("escaped.txt").exists());
    assert_eq!(report.counts.validation_failed, 1);
}

#[tokio::test]
async fn test_binary_file_skips_generation() {
    let fixture = Fixture::new(&[]);
    fs::write(fixture.path("blob.bin"), [0u8, 159, 146, 150, 0, 7, 8, 9]).unwrap();
    let generator = ScriptedGenerator::new(&[]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert!(matches!(outcomes[0].1, ResolutionOutcome::ExtractionFailed { .. }));
    assert!(generator.requests().is_empty());
    assert_eq!(report.counts.extraction_failed, 1);
}

#[tokio::test]
async fn test_window_carries_only_renames_in_order() {
    let fixture = Fixture::new(&[
        ("a.txt", "alpha"),
        ("b.txt", "alpha"),
        ("c.txt", "gamma"),
        ("d.txt", "delta"),
    ]);
    let generator = ScriptedGenerator::new(&[
        ("a.txt", Ok("Alpha.txt")),
        // duplicate of a: must not enter the window
        ("b.txt", Ok("Alpha.txt")),
        ("c.txt", Ok("Gamma.txt")),
        ("d.txt", Ok("Delta.txt")),
    ]);

    fixture.run(&generator, None, AbortFlag::default()).await;

    let requests = generator.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[0].examples.is_empty());
    assert_eq!(requests[1].examples, vec![RenameExample::new("a.txt", "Alpha.txt")]);
    assert_eq!(
        requests[3].examples,
        vec![
            RenameExample::new("a.txt", "Alpha.txt"),
            RenameExample::new("c.txt", "Gamma.txt"),
        ]
    );
    assert!(requests[3].prompt().contains("  a.txt -> Alpha.txt\n  c.txt -> Gamma.txt\n"));
}

#[tokio::test]
async fn test_estimate_matches_live_prompt_size() {
    let fixture = Fixture::new(&[("notes.txt", "minutes of the march planning meeting")]);
    let files = scan_directory(fixture.dir.path()).unwrap();
    let assembler = PromptAssembler::new(Some("chronological invoice naming"));
    let extractor = ContentExtractor::new(2000, 2);
    let rates = ModelRates::from_table("gpt-4o-mini");

    let estimate = CostEstimator::new(&assembler, &extractor, 5).estimate(&files, &rates);

    let generator = ScriptedGenerator::new(&[("notes.txt", Ok("Planning_Minutes"))]);
    fixture.run(&generator, None, AbortFlag::default()).await;

    let live = &generator.requests()[0];
    assert_eq!(estimate.input_tokens, estimate_input_tokens(live.char_count()));
}

#[tokio::test]
async fn test_abort_stops_before_next_file() {
    let fixture = Fixture::new(&[("a.txt", "one"), ("b.txt", "two")]);
    let generator = ScriptedGenerator::new(&[("a.txt", Ok("One")), ("b.txt", Ok("Two"))]);

    let abort = AbortFlag::default();
    abort.set();
    let (report, outcomes) = fixture.run(&generator, None, abort).await;

    assert!(outcomes.is_empty());
    assert!(report.interrupted);
    assert_eq!(report.exit_code(), 130);
    assert_eq!(fixture.names(), vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_missing_usage_marks_cost_partial() {
    let fixture = Fixture::new(&[("a.txt", "one")]);
    let generator = ScriptedGenerator::new(&[("a.txt", Ok("One"))]).without_usage();

    let (report, _) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert!(report.actual.is_partial());
    assert!(report.actual.input_tokens > 0);
}

#[tokio::test]
async fn test_same_name_is_unchanged() {
    let fixture = Fixture::new(&[("Report.txt", "content")]);
    let generator = ScriptedGenerator::new(&[("Report.txt", Ok("Report"))]);

    let (report, outcomes) = fixture.run(&generator, None, AbortFlag::default()).await;

    assert_eq!(outcomes[0].1, ResolutionOutcome::Unchanged);
    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_logged_run_can_be_undone() {
    let fixture = Fixture::new(&[("a.txt", "same"), ("b.txt", "same"), ("c.txt", "other")]);
    let generator = ScriptedGenerator::new(&[
        ("a.txt", Ok("Same.txt")),
        ("b.txt", Ok("Same.txt")),
        ("c.txt", Ok("Other.txt")),
    ]);

    let log_dir = TempDir::new().unwrap();
    let log = RenameLog::open(log_dir.path().join("history.log"), "test-run").unwrap();
    fixture.run(&generator, Some(&log), AbortFlag::default()).await;
    assert_eq!(fixture.names(), vec!["Other.txt", "Same.txt"]);

    let records = RenameLog::read_all(log.path()).unwrap();
    let actions: Vec<LogAction> = records.iter().map(|r| r.action).collect();
    assert_eq!(actions, vec![LogAction::Renamed, LogAction::Duplicate, LogAction::Renamed]);

    let run_id = history::latest_run_id(&records).unwrap().to_string();
    let result = history::undo_run(&records, &run_id, &fixture.manager(), None);

    assert!(result.success());
    assert_eq!(result.operations_undone, 3);
    assert_eq!(fixture.names(), vec!["a.txt", "b.txt", "c.txt"]);
    assert_eq!(fs::read_to_string(fixture.path("b.txt")).unwrap(), "same");
    assert!(Path::new(&fixture.path("a.txt")).exists());
}
