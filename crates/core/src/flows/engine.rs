use thiserror::Error;

use crate::flows::states::{ScheduleAction, ScheduleEvent, ScheduleState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: ScheduleState, event: ScheduleEvent },
}

/// The scheduling state machine:
/// `Idle → AwaitingStart → AwaitingEnd → {Committed, Cancelled}`.
///
/// Out-of-order interaction deliveries (an end-date pick while still `Idle`,
/// a stale Submit after a restart) are rejected here instead of mutating the
/// selection from whatever webhook happens to arrive.
pub fn transition(
    current: &ScheduleState,
    event: &ScheduleEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ScheduleAction::{
        CaptureEndDate, CaptureStartDate, CommitRange, DiscardSelection, RenderEndPicker,
        RenderStartPicker,
    };
    use ScheduleEvent::{
        CancelPressed, CommandReceived, EndDatePicked, NextPressed, StartDatePicked, SubmitPressed,
    };
    use ScheduleState::{AwaitingEnd, AwaitingStart, Cancelled, Committed, Idle};

    let (to, actions) = match (current, event) {
        // A fresh command always restarts from the beginning: the prior
        // in-flight selection is overwritten, last write wins.
        (Idle | AwaitingStart | AwaitingEnd, CommandReceived) => {
            (AwaitingStart, vec![RenderStartPicker])
        }
        (AwaitingStart, StartDatePicked) => (AwaitingStart, vec![CaptureStartDate]),
        (AwaitingStart, NextPressed) => (AwaitingEnd, vec![RenderEndPicker]),
        (AwaitingEnd, EndDatePicked) => (AwaitingEnd, vec![CaptureEndDate]),
        (AwaitingEnd, SubmitPressed) => (Committed, vec![CommitRange, DiscardSelection]),
        (AwaitingStart | AwaitingEnd, CancelPressed) => (Cancelled, vec![DiscardSelection]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
