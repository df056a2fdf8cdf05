use std::sync::Once;

use chrono::{TimeZone, Utc};
use scrape_core::{update, DashboardState, Effect, JobStatus, Msg, PollingState, ScrapeJob};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scrape_logging::initialize_for_tests);
}

fn job(id: &str, domain: &str, status: JobStatus, tag_count: u32) -> ScrapeJob {
    ScrapeJob {
        id: id.to_string(),
        domain: domain.to_string(),
        url: format!("https://{domain}/{id}"),
        duration_ms: if status == JobStatus::Done { 500 } else { 0 },
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        tag_count,
        status,
    }
}

fn load(state: DashboardState, jobs: Vec<ScrapeJob>) -> (DashboardState, Vec<Effect>) {
    let issued_at = state.optimistic_revision();
    update(state, Msg::SnapshotLoaded { jobs, issued_at })
}

#[test]
fn snapshot_with_pending_jobs_starts_polling() {
    init_logging();
    let (state, effects) = load(
        DashboardState::new(),
        vec![
            job("1", "a.com", JobStatus::InProgress, 0),
            job("2", "b.com", JobStatus::Done, 120),
        ],
    );

    assert_eq!(state.polling(), PollingState::Polling);
    assert!(state.has_pending());
    assert_eq!(effects, vec![Effect::StartPolling]);
    assert_eq!(state.view().in_progress, 1);
}

#[test]
fn snapshot_without_pending_jobs_keeps_idle() {
    init_logging();
    let (state, effects) = load(
        DashboardState::new(),
        vec![job("1", "a.com", JobStatus::Done, 10)],
    );

    assert_eq!(state.polling(), PollingState::Idle);
    assert!(effects.is_empty());
}

#[test]
fn starting_is_idempotent_while_polling() {
    init_logging();
    let pending = vec![job("1", "a.com", JobStatus::InProgress, 0)];
    let (state, first) = load(DashboardState::new(), pending.clone());
    let (state, second) = load(state, pending.clone());
    let (state, third) = update(state, Msg::VisibilityRegained);
    let (_state, fourth) = load(state, pending);

    assert_eq!(first, vec![Effect::StartPolling]);
    assert!(second.is_empty());
    assert_eq!(third, vec![Effect::FetchJobs]);
    assert!(fourth.is_empty());
}

#[test]
fn tick_fetches_while_jobs_are_pending() {
    init_logging();
    let (state, _) = load(
        DashboardState::new(),
        vec![job("1", "a.com", JobStatus::InProgress, 0)],
    );

    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(effects, vec![Effect::FetchJobs]);
    assert_eq!(state.polling(), PollingState::Polling);
}

#[test]
fn completed_snapshot_stops_polling_and_later_ticks_do_nothing() {
    init_logging();
    let (state, _) = load(
        DashboardState::new(),
        vec![job("1", "a.com", JobStatus::InProgress, 0)],
    );
    let (state, effects) = load(state, vec![job("1", "a.com", JobStatus::Done, 300)]);

    assert_eq!(effects, vec![Effect::StopPolling]);
    assert_eq!(state.polling(), PollingState::Idle);

    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
    assert_eq!(state.polling(), PollingState::Idle);
}

#[test]
fn fetch_failure_keeps_cache_and_timer() {
    init_logging();
    let (state, _) = load(
        DashboardState::new(),
        vec![job("1", "a.com", JobStatus::InProgress, 0)],
    );
    let before: Vec<ScrapeJob> = state.jobs().cloned().collect();

    let (mut state, effects) = update(state, Msg::FetchFailed("connection refused".into()));

    assert!(effects.is_empty());
    assert_eq!(state.jobs().cloned().collect::<Vec<_>>(), before);
    assert_eq!(state.polling(), PollingState::Polling);
    assert_eq!(state.last_error(), Some("connection refused"));
    assert!(state.consume_dirty());

    // A later successful snapshot clears the error.
    let (state, _) = load(state, before);
    assert_eq!(state.last_error(), None);
}

#[test]
fn shutdown_cancels_active_timer() {
    init_logging();
    let (state, _) = load(
        DashboardState::new(),
        vec![job("1", "a.com", JobStatus::InProgress, 0)],
    );

    let (state, effects) = update(state, Msg::Shutdown);
    assert_eq!(effects, vec![Effect::StopPolling]);
    assert_eq!(state.polling(), PollingState::Idle);

    let (_state, effects) = update(state, Msg::Shutdown);
    assert!(effects.is_empty());
}
