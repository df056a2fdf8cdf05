//! Effect runner for the dashboard state machine.
//!
//! [`PollingClient`] owns a [`DashboardState`], feeds it messages built from
//! API results, and executes the effects `update` returns: fetches go to a
//! [`ScrapeApi`], timer effects to a [`Scheduler`]. Timer ticks are queued on
//! a channel and turned into refreshes by [`PollingClient::run`] (or by
//! [`PollingClient::process_pending_ticks`] when a test drives the clock).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use scrape_core::{
    update, AggregationPolicy, DashboardState, DashboardView, Effect, JobId, Msg, PollingState,
};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use tokio::sync::{mpsc, watch};

use crate::client::ScrapeApi;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::{ApiError, ApiErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub policy: AggregationPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            policy: AggregationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollSignal {
    Tick,
    Shutdown,
}

struct Shared {
    state: DashboardState,
    /// Armed exactly while the state is `Polling`.
    timer: Option<TimerHandle>,
}

pub struct PollingClient {
    api: Arc<dyn ScrapeApi>,
    scheduler: Arc<dyn Scheduler>,
    settings: PollSettings,
    shared: Mutex<Shared>,
    signal_tx: mpsc::UnboundedSender<PollSignal>,
    signal_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PollSignal>>,
    view_tx: watch::Sender<DashboardView>,
    /// Set once `shutdown` is called; both tick loops stop on it.
    stopped: AtomicBool,
}

impl PollingClient {
    pub fn new(
        api: Arc<dyn ScrapeApi>,
        scheduler: Arc<dyn Scheduler>,
        settings: PollSettings,
    ) -> Self {
        let state = DashboardState::with_policy(settings.policy);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(state.view());
        Self {
            api,
            scheduler,
            settings,
            shared: Mutex::new(Shared { state, timer: None }),
            signal_tx,
            signal_rx: tokio::sync::Mutex::new(signal_rx),
            view_tx,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn view(&self) -> DashboardView {
        self.lock().state.view()
    }

    /// Receives a new view every time something visible changes.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_tx.subscribe()
    }

    pub fn polling(&self) -> PollingState {
        self.lock().state.polling()
    }

    /// Fetches the full list and replaces the local cache with it.
    ///
    /// On failure the cache and the timer are left alone and the error is
    /// returned.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let issued_at = self.lock().state.optimistic_revision();
        match self.api.list_scrapes().await {
            Ok(jobs) => {
                scrape_debug!("Refresh returned {} jobs", jobs.len());
                self.dispatch(Msg::SnapshotLoaded { jobs, issued_at });
                Ok(())
            }
            Err(err) => {
                scrape_warn!("Error fetching scrape results: {}", err);
                self.dispatch(Msg::FetchFailed(format!(
                    "Failed to fetch scrape results ({err})"
                )));
                Err(err)
            }
        }
    }

    /// Submits `url` and, once acknowledged, shows an `in_progress`
    /// placeholder for it straight away.
    pub async fn submit(&self, url: &str) -> Result<JobId, ApiError> {
        self.dispatch(Msg::SubmitStarted);
        match self.api.submit(url).await {
            Ok(receipt) => {
                scrape_info!("Submitted {} as scrape {}", url, receipt.id);
                self.dispatch(Msg::SubmitAccepted {
                    id: receipt.id.clone(),
                    url: url.to_string(),
                    submitted_at: Utc::now(),
                });
                Ok(receipt.id)
            }
            Err(err) => {
                scrape_warn!("Error submitting {} for scraping: {}", url, err);
                let message = if err.kind == ApiErrorKind::InvalidInput {
                    err.message.clone()
                } else {
                    format!("Failed to submit URL for scraping ({err})")
                };
                self.dispatch(Msg::SubmitFailed(message));
                Err(err)
            }
        }
    }

    /// Same as a manual refresh; there is no staleness bookkeeping.
    pub async fn visibility_regained(&self) -> Result<(), ApiError> {
        if self.dispatch(Msg::VisibilityRegained) {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    pub fn set_policy(&self, policy: AggregationPolicy) {
        self.dispatch(Msg::AggregationPolicyChanged(policy));
    }

    pub fn dismiss_error(&self) {
        self.dispatch(Msg::ErrorDismissed);
    }

    /// Handles timer ticks until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        let mut signals = self.signal_rx.lock().await;
        while !self.is_stopped() {
            match signals.recv().await {
                Some(PollSignal::Tick) => self.on_tick().await,
                Some(PollSignal::Shutdown) | None => break,
            }
        }
        scrape_debug!("Polling loop stopped");
    }

    /// Handles ticks already queued without waiting for new ones. Returns the
    /// number of ticks handled, or 0 while [`run`](Self::run) owns the queue.
    pub async fn process_pending_ticks(&self) -> usize {
        let mut processed = 0;
        while !self.is_stopped() {
            let signal = match self.signal_rx.try_lock() {
                Ok(mut signals) => signals.try_recv().ok(),
                Err(_) => None,
            };
            match signal {
                Some(PollSignal::Tick) => {
                    self.on_tick().await;
                    processed += 1;
                }
                Some(PollSignal::Shutdown) | None => break,
            }
        }
        processed
    }

    /// Cancels the poll timer and stops [`run`](Self::run).
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.dispatch(Msg::Shutdown);
        if let Some(timer) = self.lock().timer.take() {
            timer.cancel();
        }
        let _ = self.signal_tx.send(PollSignal::Shutdown);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn on_tick(&self) {
        if self.dispatch(Msg::PollTick) {
            // Failures are already recorded in the state.
            let _ = self.refresh().await;
        }
    }

    /// Runs `msg` through `update`, applies timer effects and publishes the
    /// view. Returns whether a fetch was requested.
    fn dispatch(&self, msg: Msg) -> bool {
        let mut shared = self.lock();
        let state = std::mem::take(&mut shared.state);
        let (mut state, effects) = update(state, msg);
        let view = state.consume_dirty().then(|| state.view());
        shared.state = state;

        let mut fetch = false;
        for effect in effects {
            match effect {
                Effect::FetchJobs => fetch = true,
                Effect::StartPolling => self.start_timer(&mut shared),
                Effect::StopPolling => {
                    if let Some(timer) = shared.timer.take() {
                        scrape_debug!("Polling stopped");
                        timer.cancel();
                    }
                }
            }
        }
        drop(shared);

        if let Some(view) = view {
            self.view_tx.send_replace(view);
        }
        fetch
    }

    fn start_timer(&self, shared: &mut Shared) {
        if shared.timer.is_some() {
            return;
        }
        scrape_debug!("Polling every {:?}", self.settings.interval);
        let signals = self.signal_tx.clone();
        let timer = self.scheduler.schedule_repeating(
            self.settings.interval,
            Box::new(move || {
                let _ = signals.send(PollSignal::Tick);
            }),
        );
        shared.timer = Some(timer);
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PollingClient {
    fn drop(&mut self) {
        let shared = match self.shared.get_mut() {
            Ok(shared) => shared,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(timer) = shared.timer.take() {
            timer.cancel();
        }
    }
}
