use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Opaque job identifier assigned by the store.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    /// `Done` and `Failed` are final; nothing mutates a job after either.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scrape request and its lifecycle record, in wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    pub id: JobId,
    pub domain: String,
    pub url: String,
    #[serde(rename = "duration", default)]
    pub duration_ms: u32,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_count: u32,
    pub status: JobStatus,
}

impl ScrapeJob {
    /// A fresh `in_progress` record with zeroed results.
    pub fn in_progress(
        id: impl Into<JobId>,
        url: impl Into<String>,
        domain: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            url: url.into(),
            duration_ms: 0,
            created_at,
            tag_count: 0,
            status: JobStatus::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Returns the hostname of an absolute URL, or `None` when `raw` is not one.
pub fn extract_domain(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_domain_returns_hostname_only() {
        assert_eq!(
            extract_domain("https://a.com/x?y=1").as_deref(),
            Some("a.com")
        );
        assert_eq!(
            extract_domain("http://Example.ORG:8080/page").as_deref(),
            Some("example.org")
        );
        assert_eq!(extract_domain(" https://b.io ").as_deref(), Some("b.io"));
    }

    #[test]
    fn extract_domain_rejects_relative_and_hostless_input() {
        assert_eq!(extract_domain(""), None);
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("/relative/path"), None);
        assert_eq!(extract_domain("mailto:someone@example.com"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
