//! Run orchestration for chapterscrape.
//!
//! Ties the crawler and the artifact writer together: the [`Orchestrator`]
//! schedules chapters, each [`ChapterWorker`] scrapes one chapter inside its
//! own browsing context, and a [`ProgressReporter`] observes the run.

pub mod orchestrator;
pub mod progress;
pub mod worker;

#[cfg(test)]
mod testkit;

pub use orchestrator::Orchestrator;
pub use progress::{ProgressReporter, SilentProgress};
pub use worker::{ChapterWorker, EXTRACTION_FAILED};
