//! Domain logic for the on-call scheduling bot: calendar dates and ranges,
//! the interactive scheduling state machine, the in-flight selection store,
//! and application configuration. This crate has no I/O beyond config file
//! reads; persistence and Slack transport live in the sibling crates.

pub mod config;
pub mod date;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod pending;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use date::{CalendarDate, DateError, DateRange};
pub use domain::{OnCallRecord, UserId};
pub use errors::{ApplicationError, DomainError};
pub use flows::{
    transition, FlowTransitionError, ScheduleAction, ScheduleEvent, ScheduleState,
    TransitionOutcome,
};
pub use pending::{PendingSelection, PendingSelectionStore};
