//! Scrape engine: mock job store, HTTP surface, API client and the polling runner.
mod client;
mod config;
mod persist;
mod poller;
mod repository;
mod scheduler;
mod server;
mod store;
mod types;
mod wire;

pub use client::{ClientSettings, ReqwestScrapeApi, ScrapeApi, INVALID_URL_HINT};
pub use config::ConfigError;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poller::{PollSettings, PollingClient};
pub use repository::{InMemoryRepository, JobRepository, JsonFileRepository};
pub use scheduler::{
    ManualScheduler, RepeatingTask, Scheduler, Task, TimerHandle, TokioScheduler,
};
pub use server::{create_router, run, serve, ServerError, ServerSettings};
pub use store::{JobStore, ScrapeAck, StoreError, StoreSettings, INVALID_URL, URL_REQUIRED};
pub use types::{ApiError, ApiErrorKind};
pub use wire::{ErrorBody, SubmitRequest, SubmitResponse, SUBMIT_MESSAGE};

/// Names of the environment variables read by the `from_env` loaders.
pub mod env {
    pub use crate::config::{
        AGGREGATION, API_PORT, API_URL, BIND_HOST, DB_PATH, FAILURE_RATE, POLL_INTERVAL_MS,
        REQUEST_TIMEOUT_MS, RESPONSE_DELAY_MS, SEED,
    };
}
