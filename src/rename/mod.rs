//! The rename pipeline: scanning, consistency window, collision handling
//! and the batch loop that ties them together.

pub mod collision;
pub mod entry;
pub mod orchestrator;
pub mod outcome;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use collision::{CollisionResolver, DuplicateSink, Resolution, ResolveError};
pub use entry::{scan_directory, FileEntry};
pub use orchestrator::{AbortFlag, BatchOrchestrator, BatchState};
pub use outcome::{ActualCost, BatchReport, FileFailure, OutcomeCounts, ResolutionOutcome};
pub use tracker::ConsistencyTracker;
