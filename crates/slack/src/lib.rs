pub mod blocks;
pub mod client;
pub mod commands;
pub mod flow;
pub mod payload;

pub use blocks::{
    end_date_prompt, error_message, format_range_in_words, help_message, roster_message,
    start_date_prompt, view_me_message, MessageBuilder, MessageTemplate, RosterEntry,
};
pub use client::{ChatApiError, ChatGateway, SlackApiClient, UserDirectory};
pub use commands::{classify, Command};
pub use flow::{FlowError, ScheduleService, ScheduleServiceError, SchedulingFlow};
pub use payload::{
    decode_interaction_body, EventEnvelope, Interaction, InteractionAction, PayloadError,
};
