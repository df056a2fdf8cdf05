use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scrape_core::{extract_domain, JobId, JobStatus, ScrapeJob};
use scrape_logging::{scrape_debug, scrape_error, scrape_info};
use thiserror::Error;
use uuid::Uuid;

use crate::persist::PersistError;
use crate::repository::JobRepository;
use crate::scheduler::Scheduler;

pub const URL_REQUIRED: &str = "URL is required";
pub const INVALID_URL: &str = "Invalid URL format";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("scrape {0} not found")]
    NotFound(JobId),
    #[error("job database unavailable: {0}")]
    Internal(#[from] PersistError),
    /// The blocking task running the call panicked or was cancelled.
    #[error("store call interrupted: {0}")]
    Interrupted(String),
}

/// Simulated lifecycle parameters. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub completion_delay_ms: RangeInclusive<u64>,
    pub tag_count: RangeInclusive<u32>,
    pub duration_ms: RangeInclusive<u32>,
    /// Probability in `[0, 1]` that a job ends `failed` instead of `done`.
    pub failure_rate: f64,
    /// Fixed seed for reproducible outcomes.
    pub seed: Option<u64>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            completion_delay_ms: 5_000..=15_000,
            tag_count: 100..=600,
            duration_ms: 300..=1_300,
            failure_rate: 0.0,
            seed: None,
        }
    }
}

impl StoreSettings {
    /// Upper bound on the time between creation and the terminal state.
    pub fn max_completion_delay(&self) -> Duration {
        Duration::from_millis(*self.completion_delay_ms.end())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeAck {
    pub id: JobId,
    pub acknowledged: bool,
}

/// Mock scrape backend: records submissions and completes them after a
/// random delay.
pub struct JobStore {
    repository: Arc<dyn JobRepository>,
    scheduler: Arc<dyn Scheduler>,
    settings: StoreSettings,
    rng: Arc<Mutex<StdRng>>,
    /// Held across every load-modify-save so concurrent writers never drop
    /// each other's changes.
    write_lock: Arc<Mutex<()>>,
}

impl JobStore {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        scheduler: Arc<dyn Scheduler>,
        settings: StoreSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            repository,
            scheduler,
            settings,
            rng: Arc::new(Mutex::new(rng)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Result<Vec<ScrapeJob>, StoreError> {
        Ok(self.repository.load()?)
    }

    pub fn get(&self, id: &str) -> Result<ScrapeJob, StoreError> {
        self.repository
            .load()?
            .into_iter()
            .find(|job| job.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Records `url` as `in_progress` and schedules its completion.
    pub fn create(&self, url: &str) -> Result<ScrapeAck, StoreError> {
        if url.trim().is_empty() {
            return Err(StoreError::InvalidInput(URL_REQUIRED.to_string()));
        }
        let domain =
            extract_domain(url).ok_or_else(|| StoreError::InvalidInput(INVALID_URL.to_string()))?;

        let id = Uuid::new_v4().to_string();
        {
            let _write = lock_writes(&self.write_lock);
            let mut jobs = self.repository.load()?;
            jobs.insert(0, ScrapeJob::in_progress(id.clone(), url, domain, Utc::now()));
            self.repository.save(&jobs)?;
        }

        let delay = Duration::from_millis(self.draw(|rng, settings| {
            rng.random_range(settings.completion_delay_ms.clone())
        }));
        scrape_info!("Scrape {} created for {} (completes in {:?})", id, url, delay);

        let completion = Completion {
            repository: self.repository.clone(),
            rng: self.rng.clone(),
            write_lock: self.write_lock.clone(),
            settings: self.settings.clone(),
            id: id.clone(),
        };
        // Completion is not cancellable.
        let _ = self
            .scheduler
            .schedule_once(delay, Box::new(move || completion.run()));

        Ok(ScrapeAck {
            id,
            acknowledged: true,
        })
    }

    fn draw<T>(&self, f: impl FnOnce(&mut StdRng, &StoreSettings) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng, &self.settings)
    }
}

/// Delayed second phase of a job's lifecycle.
struct Completion {
    repository: Arc<dyn JobRepository>,
    rng: Arc<Mutex<StdRng>>,
    write_lock: Arc<Mutex<()>>,
    settings: StoreSettings,
    id: JobId,
}

impl Completion {
    fn run(self) {
        if let Err(err) = self.apply() {
            scrape_error!("Failed to complete scrape {}: {}", self.id, err);
        }
    }

    fn apply(&self) -> Result<(), PersistError> {
        let _write = lock_writes(&self.write_lock);
        // Re-read: other completions may have written since creation.
        let mut jobs = self.repository.load()?;
        let Some(job) = jobs.iter_mut().find(|job| job.id == self.id) else {
            scrape_debug!("Scrape {} vanished before completion", self.id);
            return Ok(());
        };
        if job.is_terminal() {
            return Ok(());
        }

        let (failed, tag_count, duration_ms) = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let failed = rng.random_bool(self.settings.failure_rate.clamp(0.0, 1.0));
            let tag_count = rng.random_range(self.settings.tag_count.clone());
            let duration_ms = rng.random_range(self.settings.duration_ms.clone());
            (failed, tag_count, duration_ms)
        };

        job.duration_ms = duration_ms;
        if failed {
            job.status = JobStatus::Failed;
            job.tag_count = 0;
        } else {
            job.status = JobStatus::Done;
            job.tag_count = tag_count;
        }
        scrape_info!(
            "Scrape {} finished: status={} tags={} duration={}ms",
            job.id,
            job.status,
            job.tag_count,
            job.duration_ms
        );

        self.repository.save(&jobs)
    }
}

fn lock_writes(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
