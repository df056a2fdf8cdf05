use crate::{DashboardState, Effect, Msg, PollingState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: DashboardState, msg: Msg) -> (DashboardState, Vec<Effect>) {
    let effects = match msg {
        Msg::SnapshotLoaded { jobs, issued_at } => {
            state.set_error(None);
            state.apply_snapshot(jobs, issued_at);
            reconcile_polling(&mut state)
        }
        Msg::FetchFailed(message) => {
            // Cache and timer stay as they were; the next tick retries.
            state.set_error(Some(message));
            Vec::new()
        }
        Msg::SubmitStarted => {
            state.set_submitting(true);
            state.set_error(None);
            Vec::new()
        }
        Msg::SubmitAccepted {
            id,
            url,
            submitted_at,
        } => {
            state.set_submitting(false);
            state.set_error(None);
            state.insert_optimistic(id, url, submitted_at);
            reconcile_polling(&mut state)
        }
        Msg::SubmitFailed(message) => {
            state.set_submitting(false);
            state.set_error(Some(message));
            Vec::new()
        }
        Msg::PollTick => match state.polling() {
            PollingState::Idle => Vec::new(),
            PollingState::Polling if state.has_pending() => vec![Effect::FetchJobs],
            PollingState::Polling => {
                state.set_polling(PollingState::Idle);
                vec![Effect::StopPolling]
            }
        },
        Msg::VisibilityRegained => vec![Effect::FetchJobs],
        Msg::AggregationPolicyChanged(policy) => {
            state.set_policy(policy);
            Vec::new()
        }
        Msg::ErrorDismissed => {
            state.set_error(None);
            Vec::new()
        }
        Msg::Shutdown => match state.polling() {
            PollingState::Polling => {
                state.set_polling(PollingState::Idle);
                vec![Effect::StopPolling]
            }
            PollingState::Idle => Vec::new(),
        },
    };

    (state, effects)
}

/// Starting is idempotent while a timer is armed; stopping happens as soon as
/// nothing is pending.
fn reconcile_polling(state: &mut DashboardState) -> Vec<Effect> {
    match (state.polling(), state.has_pending()) {
        (PollingState::Idle, true) => {
            state.set_polling(PollingState::Polling);
            vec![Effect::StartPolling]
        }
        (PollingState::Polling, false) => {
            state.set_polling(PollingState::Idle);
            vec![Effect::StopPolling]
        }
        _ => Vec::new(),
    }
}
