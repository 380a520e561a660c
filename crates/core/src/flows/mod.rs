pub mod engine;
pub mod states;

pub use engine::{transition, FlowTransitionError};
pub use states::{ScheduleAction, ScheduleEvent, ScheduleState, TransitionOutcome};
