use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::view_model::{DashboardView, JobRowView};
use crate::{extract_domain, AggregationPolicy, DomainSummary, JobId, ScrapeJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollingState {
    #[default]
    Idle,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Authoritative copy from the latest snapshot.
    Remote,
    /// Local placeholder inserted at the given optimistic revision.
    Optimistic { revision: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedJob {
    job: ScrapeJob,
    origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardState {
    jobs: Vec<CachedJob>,
    summary: DomainSummary,
    policy: AggregationPolicy,
    polling: PollingState,
    has_pending: bool,
    submitting: bool,
    last_error: Option<String>,
    revision: u64,
    dirty: bool,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: AggregationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            jobs: self
                .jobs
                .iter()
                .map(|cached| JobRowView {
                    id: cached.job.id.clone(),
                    url: cached.job.url.clone(),
                    domain: cached.job.domain.clone(),
                    status: cached.job.status,
                    tag_count: cached.job.tag_count,
                    duration_ms: cached.job.duration_ms,
                    created_at: cached.job.created_at,
                    optimistic: matches!(cached.origin, Origin::Optimistic { .. }),
                })
                .collect(),
            domain_summary: self.summary.rows(),
            policy: self.policy,
            polling: self.polling,
            in_progress: self.pending_count(),
            submitting: self.submitting,
            last_error: self.last_error.clone(),
        }
    }

    pub fn jobs(&self) -> impl Iterator<Item = &ScrapeJob> {
        self.jobs.iter().map(|cached| &cached.job)
    }

    pub fn summary(&self) -> &DomainSummary {
        &self.summary
    }

    pub fn polling(&self) -> PollingState {
        self.polling
    }

    pub fn has_pending(&self) -> bool {
        self.has_pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Revision to attach to a fetch issued now; see [`crate::Msg::SnapshotLoaded`].
    pub fn optimistic_revision(&self) -> u64 {
        self.revision
    }

    /// Returns whether anything visible changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_polling(&mut self, polling: PollingState) {
        if self.polling != polling {
            self.polling = polling;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_submitting(&mut self, submitting: bool) {
        if self.submitting != submitting {
            self.submitting = submitting;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        if self.last_error != error {
            self.last_error = error;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_policy(&mut self, policy: AggregationPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.recompute();
        }
    }

    /// Replaces the cache with `snapshot`. Optimistic entries newer than
    /// `issued_at` survive when the snapshot does not know their id yet.
    pub(crate) fn apply_snapshot(&mut self, snapshot: Vec<ScrapeJob>, issued_at: u64) {
        let known: HashSet<&str> = snapshot.iter().map(|job| job.id.as_str()).collect();
        let mut next: Vec<CachedJob> = self
            .jobs
            .iter()
            .filter(|cached| match cached.origin {
                Origin::Optimistic { revision } => {
                    revision > issued_at && !known.contains(cached.job.id.as_str())
                }
                Origin::Remote => false,
            })
            .cloned()
            .collect();
        next.extend(snapshot.into_iter().map(|job| CachedJob {
            job,
            origin: Origin::Remote,
        }));

        if next != self.jobs {
            self.jobs = next;
            self.recompute();
        }
    }

    /// Prepends an `in_progress` placeholder for an acknowledged submission.
    pub(crate) fn insert_optimistic(&mut self, id: JobId, url: String, at: DateTime<Utc>) {
        if self.jobs.iter().any(|cached| cached.job.id == id) {
            return;
        }
        self.revision += 1;
        let domain = extract_domain(&url).unwrap_or_default();
        self.jobs.insert(
            0,
            CachedJob {
                job: ScrapeJob::in_progress(id, url, domain, at),
                origin: Origin::Optimistic {
                    revision: self.revision,
                },
            },
        );
        self.recompute();
    }

    fn pending_count(&self) -> usize {
        self.jobs().filter(|job| !job.is_terminal()).count()
    }

    fn recompute(&mut self) {
        self.has_pending = self.jobs.iter().any(|cached| !cached.job.is_terminal());
        self.summary = DomainSummary::compute(self.jobs(), self.policy);
        self.mark_dirty();
    }
}
