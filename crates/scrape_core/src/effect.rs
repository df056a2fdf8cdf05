#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the full job list from the store.
    FetchJobs,
    /// Arm the repeating poll timer.
    StartPolling,
    /// Cancel the poll timer.
    StopPolling,
}
