use serde::{Deserialize, Serialize};

/// Explicit per-user scheduling state, validated on every transition.
///
/// The state lives alongside the pending selection instead of being inferred
/// from which control tokens the last rendered message happened to carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    Idle,
    AwaitingStart,
    AwaitingEnd,
    Committed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    CommandReceived,
    StartDatePicked,
    NextPressed,
    EndDatePicked,
    SubmitPressed,
    CancelPressed,
}

/// Side effects the orchestrator must perform after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleAction {
    RenderStartPicker,
    CaptureStartDate,
    RenderEndPicker,
    CaptureEndDate,
    CommitRange,
    DiscardSelection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ScheduleState,
    pub to: ScheduleState,
    pub event: ScheduleEvent,
    pub actions: Vec<ScheduleAction>,
}
