use chapterscrape_shared::{Chapter, ChapterOutcome, RunSummary};

/// Progress callback for reporting run status.
///
/// Called concurrently from every in-flight chapter, so implementations must
/// be cheap and thread-safe.
pub trait ProgressReporter: Send + Sync {
    /// A chapter acquired its slot and started resolving its listing.
    fn chapter_started(&self, chapter: &Chapter);
    /// The listing of `chapter` was harvested.
    fn members_found(&self, chapter: &str, count: usize);
    /// One more profile of `chapter` finished (successfully or degraded).
    fn profile_done(&self, chapter: &str, done: usize, total: usize);
    /// A chapter was written or skipped.
    fn chapter_finished(&self, outcome: &ChapterOutcome);
    /// The whole run completed.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn chapter_started(&self, _chapter: &Chapter) {}
    fn members_found(&self, _chapter: &str, _count: usize) {}
    fn profile_done(&self, _chapter: &str, _done: usize, _total: usize) {}
    fn chapter_finished(&self, _outcome: &ChapterOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}
