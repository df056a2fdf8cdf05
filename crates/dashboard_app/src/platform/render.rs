use std::fmt::Write;

use scrape_core::{AggregationPolicy, DashboardView, JobRowView, JobStatus, PollingState};

const URL_WIDTH: usize = 48;

/// Renders the whole dashboard as plain text, one screen per call.
pub fn render(view: &DashboardView) -> String {
    let mut out = String::new();

    let polling = match view.polling {
        PollingState::Idle => "idle",
        PollingState::Polling => "polling",
    };
    let _ = writeln!(
        out,
        "Scrape results: {} jobs, {} in progress [{}]",
        view.jobs.len(),
        view.in_progress,
        polling
    );

    if view.jobs.is_empty() {
        out.push_str("  No scrape jobs yet. Enter a URL to start one.\n");
    } else {
        let _ = writeln!(
            out,
            "  {:<11} {:>8} {:>9}  {:<19}  {:<24} URL",
            "STATUS", "TAGS", "DURATION", "SUBMITTED", "DOMAIN"
        );
        for job in &view.jobs {
            out.push_str(&format_job_row(job));
            out.push('\n');
        }
    }

    let scope = match view.policy {
        AggregationPolicy::CompletedOnly => "completed jobs",
        AggregationPolicy::AllJobs => "all jobs",
    };
    let _ = writeln!(out, "Tags by domain ({scope}):");
    if view.domain_summary.is_empty() {
        out.push_str("  none\n");
    }
    for row in &view.domain_summary {
        let _ = writeln!(
            out,
            "  {:<32} {:>10}  ({} {})",
            row.domain,
            format_with_commas(row.total_tag_count),
            row.jobs,
            if row.jobs == 1 { "job" } else { "jobs" }
        );
    }

    if view.submitting {
        out.push_str("Submitting...\n");
    }
    if let Some(error) = &view.last_error {
        let _ = writeln!(out, "Error: {error}");
    }
    out
}

fn format_job_row(job: &JobRowView) -> String {
    let (tags, duration) = match job.status {
        JobStatus::Done => (
            format_with_commas(u64::from(job.tag_count)),
            format!("{}ms", job.duration_ms),
        ),
        JobStatus::Failed => ("-".to_string(), format!("{}ms", job.duration_ms)),
        JobStatus::InProgress => ("-".to_string(), "-".to_string()),
    };
    let marker = if job.optimistic { " *" } else { "" };
    format!(
        "  {:<11} {:>8} {:>9}  {:<19}  {:<24} {}{}",
        job.status.as_str(),
        tags,
        duration,
        job.created_at.format("%Y-%m-%d %H:%M:%S"),
        job.domain,
        truncate(&job.url, URL_WIDTH),
        marker
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
