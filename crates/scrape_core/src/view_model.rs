use chrono::{DateTime, Utc};

use crate::{AggregationPolicy, DomainTotal, JobId, JobStatus, PollingState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardView {
    pub jobs: Vec<JobRowView>,
    pub domain_summary: Vec<DomainTotal>,
    pub policy: AggregationPolicy,
    pub polling: PollingState,
    pub in_progress: usize,
    pub submitting: bool,
    pub last_error: Option<String>,
}

impl DashboardView {
    /// Rolled-up tag count for `domain`, if any job counts toward it.
    pub fn summary_total(&self, domain: &str) -> Option<u64> {
        self.domain_summary
            .iter()
            .find(|row| row.domain == domain)
            .map(|row| row.total_tag_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub id: JobId,
    pub url: String,
    pub domain: String,
    pub status: JobStatus,
    pub tag_count: u32,
    pub duration_ms: u32,
    pub created_at: DateTime<Utc>,
    /// Local placeholder not yet confirmed by a snapshot.
    pub optimistic: bool,
}
