use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scrape_core::{AggregationPolicy, JobStatus, PollingState, ScrapeJob};
use scrape_engine::{
    create_router, serve, ApiError, ApiErrorKind, ClientSettings, InMemoryRepository, JobStore,
    ManualScheduler, PollSettings, PollingClient, ReqwestScrapeApi, ScrapeApi, ServerSettings,
    StoreSettings, SubmitResponse,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serves scripted list responses; the last one repeats once the script runs out.
#[derive(Default)]
struct ScriptedApi {
    lists: Mutex<VecDeque<Result<Vec<ScrapeJob>, ApiError>>>,
    last: Mutex<Vec<ScrapeJob>>,
    list_calls: AtomicUsize,
    next_id: AtomicUsize,
    /// When set, the next list call waits for this before answering.
    hold: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedApi {
    fn push(&self, response: Result<Vec<ScrapeJob>, ApiError>) {
        self.lists.lock().unwrap().push_back(response);
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScrapeApi for ScriptedApi {
    async fn list_scrapes(&self) -> Result<Vec<ScrapeJob>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        match self.lists.lock().unwrap().pop_front() {
            Some(Ok(jobs)) => {
                *self.last.lock().unwrap() = jobs.clone();
                Ok(jobs)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn get_scrape(&self, id: &str) -> Result<Option<ScrapeJob>, ApiError> {
        Ok(self.last.lock().unwrap().iter().find(|job| job.id == id).cloned())
    }

    async fn submit(&self, url: &str) -> Result<SubmitResponse, ApiError> {
        if !url.starts_with("http") {
            return Err(ApiError::new(ApiErrorKind::InvalidInput, "Invalid URL format"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitResponse {
            success: true,
            id: format!("job-{n}"),
            message: "URL scraping has been initiated".to_string(),
        })
    }
}

fn pending(id: &str, domain: &str) -> ScrapeJob {
    ScrapeJob::in_progress(id, format!("https://{domain}/"), domain, Utc::now())
}

fn done(id: &str, domain: &str, tags: u32) -> ScrapeJob {
    ScrapeJob {
        status: JobStatus::Done,
        tag_count: tags,
        duration_ms: 500,
        ..pending(id, domain)
    }
}

fn client(api: Arc<ScriptedApi>) -> (PollingClient, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let client = PollingClient::new(api, scheduler.clone(), PollSettings::default());
    (client, scheduler)
}

async fn tick(client: &PollingClient, scheduler: &ManualScheduler) -> usize {
    scheduler.advance(Duration::from_secs(3));
    client.process_pending_ticks().await
}

#[tokio::test]
async fn accepted_submission_shows_up_first_and_starts_polling() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![done("old", "a.com", 10)]));
    let (client, scheduler) = client(api.clone());
    client.refresh().await.unwrap();
    assert_eq!(client.polling(), PollingState::Idle);

    let id = client.submit("https://b.com/page").await.unwrap();

    let view = client.view();
    assert_eq!(view.jobs[0].id, id);
    assert_eq!(view.jobs[0].domain, "b.com");
    assert_eq!(view.jobs[0].status, JobStatus::InProgress);
    assert!(view.jobs[0].optimistic);
    assert_eq!(view.jobs[1].id, "old");
    assert_eq!(view.in_progress, 1);
    assert!(!view.submitting);
    assert_eq!(client.polling(), PollingState::Polling);
    assert_eq!(scheduler.pending(), 1);
}

#[tokio::test]
async fn polling_refreshes_until_nothing_is_pending() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![pending("p", "a.com")]));
    api.push(Ok(vec![pending("p", "a.com")]));
    api.push(Ok(vec![done("p", "a.com", 321)]));
    let (client, scheduler) = client(api.clone());

    client.refresh().await.unwrap();
    assert_eq!(client.polling(), PollingState::Polling);

    scheduler.advance(Duration::from_millis(2_999));
    assert_eq!(client.process_pending_ticks().await, 0);
    assert_eq!(api.list_calls(), 1);

    assert_eq!(tick(&client, &scheduler).await, 1);
    assert_eq!(api.list_calls(), 2);
    assert_eq!(client.polling(), PollingState::Polling);

    assert_eq!(tick(&client, &scheduler).await, 1);
    assert_eq!(api.list_calls(), 3);
    assert_eq!(client.polling(), PollingState::Idle);
    assert_eq!(client.view().summary_total("a.com"), Some(321));

    assert_eq!(scheduler.pending(), 0);
    assert_eq!(tick(&client, &scheduler).await, 0);
    assert_eq!(api.list_calls(), 3);
}

#[tokio::test]
async fn snapshot_without_pending_jobs_never_starts_polling() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![done("a", "a.com", 5), done("b", "a.com", 7)]));
    let (client, scheduler) = client(api.clone());

    client.refresh().await.unwrap();

    assert_eq!(client.polling(), PollingState::Idle);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(client.view().summary_total("a.com"), Some(12));
}

#[tokio::test]
async fn failed_fetch_keeps_cache_and_timer() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![pending("p", "a.com")]));
    api.push(Err(ApiError::new(ApiErrorKind::Transport, "connection refused")));
    api.push(Ok(vec![done("p", "a.com", 9)]));
    let (client, scheduler) = client(api.clone());
    client.refresh().await.unwrap();

    tick(&client, &scheduler).await;
    let view = client.view();
    assert_eq!(view.jobs.len(), 1);
    assert_eq!(view.jobs[0].status, JobStatus::InProgress);
    let error = view.last_error.expect("error recorded");
    assert!(error.starts_with("Failed to fetch scrape results"), "{error}");
    assert_eq!(client.polling(), PollingState::Polling);

    tick(&client, &scheduler).await;
    let view = client.view();
    assert_eq!(view.last_error, None);
    assert_eq!(view.jobs[0].status, JobStatus::Done);
    assert_eq!(client.polling(), PollingState::Idle);
}

#[tokio::test]
async fn snapshot_issued_before_submit_keeps_optimistic_entry() {
    let api = Arc::new(ScriptedApi::default());
    let (client, _scheduler) = client(api.clone());
    let (release, hold) = oneshot::channel();
    *api.hold.lock().unwrap() = Some(hold);
    api.push(Ok(vec![done("old", "a.com", 1)]));

    let submit_then_release = async {
        let id = client.submit("https://fresh.com").await;
        let _ = release.send(());
        id
    };
    let (refreshed, id) = tokio::join!(client.refresh(), submit_then_release);
    refreshed.unwrap();
    let id = id.unwrap();

    let view = client.view();
    assert_eq!(view.jobs.len(), 2);
    assert_eq!(view.jobs[0].id, id);
    assert!(view.jobs[0].optimistic);
    assert_eq!(view.jobs[1].id, "old");
    assert_eq!(client.polling(), PollingState::Polling);
}

#[tokio::test]
async fn snapshot_issued_after_submit_is_authoritative() {
    let api = Arc::new(ScriptedApi::default());
    let (client, _scheduler) = client(api.clone());

    let id = client.submit("https://fresh.com").await.unwrap();
    api.push(Ok(vec![done("old", "a.com", 1)]));
    client.refresh().await.unwrap();
    assert!(client.view().jobs.iter().all(|job| job.id != id));

    api.push(Ok(vec![pending(&id, "fresh.com"), done("old", "a.com", 1)]));
    client.refresh().await.unwrap();
    let view = client.view();
    assert_eq!(view.jobs[0].id, id);
    assert!(!view.jobs[0].optimistic);
}

#[tokio::test]
async fn rejected_submission_reports_server_message() {
    let api = Arc::new(ScriptedApi::default());
    let (client, scheduler) = client(api.clone());

    let err = client.submit("ftp-nope").await.unwrap_err();
    assert!(err.is_user_error());

    let view = client.view();
    assert!(view.jobs.is_empty());
    assert_eq!(view.last_error.as_deref(), Some("Invalid URL format"));
    assert!(!view.submitting);
    assert_eq!(scheduler.pending(), 0);

    client.dismiss_error();
    assert_eq!(client.view().last_error, None);
}

#[tokio::test]
async fn policy_switch_changes_rollup() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![pending("p", "a.com"), done("d", "a.com", 40)]));
    let (client, _scheduler) = client(api.clone());
    client.refresh().await.unwrap();
    assert_eq!(client.view().summary_total("a.com"), Some(40));

    client.set_policy(AggregationPolicy::AllJobs);
    let view = client.view();
    assert_eq!(view.policy, AggregationPolicy::AllJobs);
    let row = view
        .domain_summary
        .iter()
        .find(|row| row.domain == "a.com")
        .unwrap();
    assert_eq!(row.jobs, 2);
}

#[tokio::test]
async fn shutdown_cancels_the_timer() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![pending("p", "a.com")]));
    let (client, scheduler) = client(api.clone());
    client.refresh().await.unwrap();
    assert_eq!(scheduler.pending(), 1);

    client.shutdown();
    client.run().await;

    assert_eq!(client.polling(), PollingState::Idle);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(tick(&client, &scheduler).await, 0);
    assert_eq!(api.list_calls(), 1);
}

#[tokio::test]
async fn run_returns_after_shutdown_even_if_ticks_were_drained() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![pending("p", "a.com")]));
    let (client, scheduler) = client(api.clone());
    client.refresh().await.unwrap();

    client.shutdown();
    assert_eq!(tick(&client, &scheduler).await, 0);
    assert_eq!(client.process_pending_ticks().await, 0);

    tokio::time::timeout(Duration::from_secs(1), client.run())
        .await
        .expect("run stops after shutdown");
}

#[tokio::test]
async fn visibility_regained_refreshes_immediately() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![done("a", "a.com", 3)]));
    let (client, _scheduler) = client(api.clone());

    client.visibility_regained().await.unwrap();

    assert_eq!(api.list_calls(), 1);
    assert_eq!(client.view().jobs.len(), 1);
}

#[tokio::test]
async fn subscribers_see_published_views() {
    let api = Arc::new(ScriptedApi::default());
    api.push(Ok(vec![done("a", "a.com", 3)]));
    let (client, _scheduler) = client(api.clone());
    let mut views = client.subscribe();

    client.refresh().await.unwrap();

    assert!(views.has_changed().unwrap());
    assert_eq!(views.borrow_and_update().jobs.len(), 1);
}

#[tokio::test]
async fn dashboard_tracks_real_server_to_completion() {
    let scheduler = Arc::new(ManualScheduler::new());
    let server_settings = ServerSettings {
        response_delay: Duration::ZERO,
        store: StoreSettings {
            seed: Some(1),
            ..StoreSettings::default()
        },
        ..ServerSettings::default()
    };
    let store = Arc::new(JobStore::new(
        Arc::new(InMemoryRepository::new()),
        scheduler.clone(),
        server_settings.store.clone(),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(serve(
        listener,
        create_router(store, &server_settings),
        async move {
            let _ = stop_rx.await;
        },
    ));

    let api = ReqwestScrapeApi::new(&ClientSettings {
        base_url: format!("http://{addr}"),
        ..ClientSettings::default()
    })
    .unwrap();
    let client = PollingClient::new(Arc::new(api), scheduler.clone(), PollSettings::default());

    client.refresh().await.unwrap();
    let id = client.submit("https://example.com/a").await.unwrap();
    assert_eq!(client.polling(), PollingState::Polling);

    let mut ticks = 0;
    while client.polling() == PollingState::Polling {
        scheduler.advance(Duration::from_secs(3));
        client.process_pending_ticks().await;
        ticks += 1;
        assert!(ticks <= 10, "job never completed");
    }

    let view = client.view();
    assert_eq!(view.jobs.len(), 1);
    assert_eq!(view.jobs[0].id, id);
    assert_eq!(view.jobs[0].status, JobStatus::Done);
    assert!(!view.jobs[0].optimistic);
    assert_eq!(
        view.summary_total("example.com"),
        Some(u64::from(view.jobs[0].tag_count))
    );

    client.shutdown();
    let _ = stop_tx.send(());
}
