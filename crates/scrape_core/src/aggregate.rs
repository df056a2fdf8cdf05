use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{JobStatus, ScrapeJob};

/// Which jobs contribute their tag count to the per-domain rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationPolicy {
    /// Only `done` jobs count.
    #[default]
    CompletedOnly,
    /// Every record counts, including in-flight placeholders (their count is 0).
    AllJobs,
}

impl AggregationPolicy {
    pub fn admits(self, job: &ScrapeJob) -> bool {
        match self {
            AggregationPolicy::CompletedOnly => job.status == JobStatus::Done,
            AggregationPolicy::AllJobs => true,
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::CompletedOnly => f.write_str("completed"),
            AggregationPolicy::AllJobs => f.write_str("all"),
        }
    }
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "done" => Ok(AggregationPolicy::CompletedOnly),
            "all" => Ok(AggregationPolicy::AllJobs),
            other => Err(format!("unknown aggregation policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTotal {
    pub domain: String,
    pub total_tag_count: u64,
    /// Number of jobs that contributed to `total_tag_count`.
    pub jobs: usize,
}

/// Derived per-domain rollup, ordered by domain name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainSummary {
    totals: BTreeMap<String, (u64, usize)>,
}

impl DomainSummary {
    pub fn compute<'a>(
        jobs: impl IntoIterator<Item = &'a ScrapeJob>,
        policy: AggregationPolicy,
    ) -> Self {
        let mut totals: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        for job in jobs.into_iter().filter(|job| policy.admits(job)) {
            let entry = totals.entry(job.domain.clone()).or_default();
            entry.0 += u64::from(job.tag_count);
            entry.1 += 1;
        }
        Self { totals }
    }

    pub fn total_for(&self, domain: &str) -> Option<u64> {
        self.totals.get(domain).map(|(total, _)| *total)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn rows(&self) -> Vec<DomainTotal> {
        self.totals
            .iter()
            .map(|(domain, (total, jobs))| DomainTotal {
                domain: domain.clone(),
                total_tag_count: *total,
                jobs: *jobs,
            })
            .collect()
    }
}
