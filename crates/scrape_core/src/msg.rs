use chrono::{DateTime, Utc};

use crate::{AggregationPolicy, JobId, ScrapeJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A full job list arrived from the store.
    SnapshotLoaded {
        jobs: Vec<ScrapeJob>,
        /// Optimistic revision observed when the fetch was issued.
        issued_at: u64,
    },
    /// Fetching the job list failed; the cache is kept as-is.
    FetchFailed(String),
    /// User asked for a submission; cleared by the outcome message.
    SubmitStarted,
    /// The store acknowledged a submission.
    SubmitAccepted {
        id: JobId,
        url: String,
        submitted_at: DateTime<Utc>,
    },
    /// The submission was rejected or never reached the store.
    SubmitFailed(String),
    /// The repeating poll timer fired.
    PollTick,
    /// The consumer became visible again after being suspended.
    VisibilityRegained,
    /// Switch the rule used for the per-domain rollup.
    AggregationPolicyChanged(AggregationPolicy),
    /// User dismissed the current error message.
    ErrorDismissed,
    /// Client is going away; polling must stop.
    Shutdown,
}
