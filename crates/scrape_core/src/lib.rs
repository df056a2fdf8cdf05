//! Scrape dashboard core: job model, domain rollup and the pure polling state machine.
mod aggregate;
mod effect;
mod job;
mod msg;
mod state;
mod update;
mod view_model;

pub use aggregate::{AggregationPolicy, DomainSummary, DomainTotal};
pub use effect::Effect;
pub use job::{extract_domain, JobId, JobStatus, ScrapeJob};
pub use msg::Msg;
pub use state::{DashboardState, PollingState};
pub use update::update;
pub use view_model::{DashboardView, JobRowView};
