use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::{debug, info, warn};

use oncall_core::date::{CalendarDate, DateRange};
use oncall_core::domain::{OnCallRecord, UserId};
use oncall_core::errors::{ApplicationError, DomainError};
use oncall_core::flows::{transition, ScheduleAction, ScheduleEvent};
use oncall_core::pending::PendingSelectionStore;

use crate::blocks::{
    self, RosterEntry, END_CANCEL_ACTION, END_PICKER_ACTION, END_SUBMIT_ACTION,
    START_CANCEL_ACTION, START_NEXT_ACTION, START_PICKER_ACTION,
};
use crate::client::{ChatApiError, ChatGateway, UserDirectory};
use crate::commands::{classify, Command};
use crate::payload::Interaction;

/// Persistence seam the flow drives. The server crate implements this over
/// the write-behind buffer; tests use a recording fake.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn enqueue(&self, record: OnCallRecord) -> Result<(), ScheduleServiceError>;
    async fn reset(&self, user_id: &UserId, display_name: &str)
        -> Result<(), ScheduleServiceError>;
    async fn visible_records(&self) -> Result<Vec<OnCallRecord>, ScheduleServiceError>;
    async fn record_for(&self, user_id: &UserId)
        -> Result<Option<OnCallRecord>, ScheduleServiceError>;
}

#[derive(Debug, Error)]
#[error("schedule service failure: {0}")]
pub struct ScheduleServiceError(pub String);

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Chat(#[from] ChatApiError),
    #[error(transparent)]
    Schedule(#[from] ScheduleServiceError),
}

/// Orchestrates the interactive scheduling conversation: routes chat
/// commands, drives the state machine from block actions, and hands
/// committed ranges to the schedule service.
///
/// User mistakes (a bad date, a click on a stale control) are answered with
/// an ephemeral message and swallowed; only transport and persistence
/// failures surface as [`FlowError`].
pub struct SchedulingFlow<C, D, S> {
    chat: C,
    directory: D,
    schedule: S,
    pending: Arc<PendingSelectionStore>,
    settle_minutes: u64,
}

impl<C, D, S> SchedulingFlow<C, D, S>
where
    C: ChatGateway,
    D: UserDirectory,
    S: ScheduleService,
{
    pub fn new(
        chat: C,
        directory: D,
        schedule: S,
        pending: Arc<PendingSelectionStore>,
        settle_minutes: u64,
    ) -> Self {
        Self { chat, directory, schedule, pending, settle_minutes }
    }

    /// Routes one channel message. Unrecognized text is ignored so the bot
    /// stays silent in ordinary conversation.
    pub async fn handle_message(
        &self,
        user_id: &str,
        channel_id: &str,
        text: &str,
    ) -> Result<(), FlowError> {
        let Some(command) = classify(text) else {
            return Ok(());
        };

        info!(user_id, command = ?command, "chat command received");
        let user = UserId::from(user_id);

        match command {
            Command::OnCall => {
                // Restarting mid-flow is allowed and discards prior picks.
                let state = self.pending.state_of(&user);
                let outcome = match transition(&state, &ScheduleEvent::CommandReceived) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(user_id = %user, state = ?state, "command rejected by the flow");
                        let guidance =
                            ApplicationError::from(DomainError::from(error)).user_message();
                        self.chat
                            .post_ephemeral(channel_id, user_id, &blocks::error_message(&guidance))
                            .await?;
                        return Ok(());
                    }
                };
                if outcome.actions.contains(&ScheduleAction::RenderStartPicker) {
                    self.pending.begin(&user);
                    let prompt = blocks::start_date_prompt(&today());
                    self.chat.post_message(channel_id, &prompt).await?;
                }
            }
            Command::ViewOnCall => {
                let records = self.schedule.visible_records().await?;
                let mut entries = Vec::with_capacity(records.len());
                for record in records {
                    let avatar_url = if record.is_scheduled() {
                        self.lookup_avatar(&record.user_id).await
                    } else {
                        None
                    };
                    entries.push(RosterEntry { record, avatar_url });
                }
                self.chat.post_message(channel_id, &blocks::roster_message(&entries)).await?;
            }
            Command::ViewMe => {
                let record = self
                    .schedule
                    .record_for(&user)
                    .await?
                    .unwrap_or_else(|| OnCallRecord::unscheduled(user_id, user_id));
                self.chat
                    .post_ephemeral(channel_id, user_id, &blocks::view_me_message(&record))
                    .await?;
            }
            Command::ResetOnCall => {
                // Message events carry no display name; the stored one wins
                // on conflict, so the id only names a brand-new row.
                self.schedule.reset(&user, user_id).await?;
                self.pending.clear(&user);
                self.chat.post_ephemeral(channel_id, user_id, &blocks::reset_ack()).await?;
            }
            Command::Help => {
                self.chat.post_ephemeral(channel_id, user_id, &blocks::help_message()).await?;
            }
        }

        Ok(())
    }

    /// Drives one block action through the state machine. Returns `Ok` for
    /// everything the user can fix themselves; those get ephemeral guidance
    /// instead of an error.
    pub async fn handle_interaction(&self, interaction: Interaction) -> Result<(), FlowError> {
        let user = UserId::from(interaction.user_id.as_str());
        let event = match interaction.action.action_id.as_str() {
            START_PICKER_ACTION => ScheduleEvent::StartDatePicked,
            END_PICKER_ACTION => ScheduleEvent::EndDatePicked,
            START_NEXT_ACTION => ScheduleEvent::NextPressed,
            END_SUBMIT_ACTION => ScheduleEvent::SubmitPressed,
            START_CANCEL_ACTION | END_CANCEL_ACTION => ScheduleEvent::CancelPressed,
            other => {
                debug!(action_id = other, "ignoring unknown action id");
                return Ok(());
            }
        };

        let state = self.pending.state_of(&user);
        let outcome = match transition(&state, &event) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(user_id = %user, state = ?state, event = ?event, "stale or out-of-order control");
                let guidance = ApplicationError::from(DomainError::from(error)).user_message();
                return self.guide(&interaction, &guidance).await;
            }
        };

        // The machine prescribes the side effects; this loop performs them.
        let mut committed_range: Option<String> = None;
        for action in &outcome.actions {
            match action {
                ScheduleAction::CaptureStartDate => {
                    let Some(date) = self.picked_date(&interaction).await? else {
                        return Ok(());
                    };
                    self.pending.set_start_date(&user, date);
                }
                ScheduleAction::CaptureEndDate => {
                    let Some(date) = self.picked_date(&interaction).await? else {
                        return Ok(());
                    };
                    self.pending.set_end_date(&user, date);
                }
                ScheduleAction::RenderEndPicker => {
                    // A never-touched picker sends no action; fall back to
                    // what the message was displaying, then to today.
                    let start = match self.pending.get(&user).and_then(|s| s.start_date) {
                        Some(date) => date,
                        None => {
                            let fallback = self.displayed_or_today(&interaction);
                            self.pending.set_start_date(&user, fallback.clone());
                            fallback
                        }
                    };
                    self.pending.advance(&user);
                    let prompt = blocks::end_date_prompt(&start);
                    self.chat
                        .update_message(&interaction.channel_id, &interaction.message_ts, &prompt)
                        .await?;
                }
                ScheduleAction::CommitRange => {
                    match self.commit_range(&user, &interaction).await? {
                        Some(words) => committed_range = Some(words),
                        // Guidance was sent and the selection is kept for a
                        // resubmit; skip the remaining actions.
                        None => return Ok(()),
                    }
                }
                ScheduleAction::DiscardSelection => {
                    self.pending.clear(&user);
                    self.chat
                        .delete_message(&interaction.channel_id, &interaction.message_ts)
                        .await?;
                    let ack = match committed_range.as_deref() {
                        Some(words) => blocks::submit_ack(words, self.settle_minutes),
                        None => blocks::cancelled_ack(),
                    };
                    self.chat
                        .post_ephemeral(&interaction.channel_id, &interaction.user_id, &ack)
                        .await?;
                    if committed_range.is_none() {
                        info!(user_id = %user, "scheduling cancelled");
                    }
                }
                ScheduleAction::RenderStartPicker => {
                    // Only the chat command renders the start picker.
                }
            }
        }

        Ok(())
    }

    /// Validates and persists the selected range. Returns the committed
    /// range in words, or `None` after sending the user fixable guidance.
    async fn commit_range(
        &self,
        user: &UserId,
        interaction: &Interaction,
    ) -> Result<Option<String>, FlowError> {
        let selection = self.pending.get(user);
        let start = match selection.as_ref().and_then(|s| s.start_date.clone()) {
            Some(date) => date,
            None => self.displayed_or_today(interaction),
        };
        let end = match selection.as_ref().and_then(|s| s.end_date.clone()) {
            Some(date) => date,
            None => self.displayed_or_today(interaction),
        };

        let range = match DateRange::new(start, end) {
            Ok(range) => range,
            Err(error) => {
                // Selection is kept so the user can fix the end date and
                // resubmit from the same message.
                let guidance = ApplicationError::from(DomainError::from(error)).user_message();
                return self.guide(interaction, &guidance).await.map(|()| None);
            }
        };

        let words = blocks::format_range_in_words(range.start(), range.end());
        let (start, end) = range.into_parts();
        let record = OnCallRecord::scheduled(
            interaction.user_id.clone(),
            interaction.username.clone(),
            start,
            end,
        );

        if let Err(error) = self.schedule.enqueue(record).await {
            warn!(user_id = %user, error = %error, "enqueue failed, selection retained");
            let guidance = ApplicationError::Persistence(error.to_string()).user_message();
            return self.guide(interaction, &guidance).await.map(|()| None);
        }

        info!(user_id = %user, range = %words, "on-call range committed");
        Ok(Some(words))
    }

    /// Parses the picked date out of a datepicker action, answering bad
    /// input with ephemeral guidance. `None` means "handled, stop here".
    async fn picked_date(
        &self,
        interaction: &Interaction,
    ) -> Result<Option<CalendarDate>, FlowError> {
        let Some(raw) = interaction.action.selected_date.as_deref() else {
            // Clearing a picker delivers no date; there is nothing to record.
            debug!(action_id = %interaction.action.action_id, "picker action without a date");
            return Ok(None);
        };

        match CalendarDate::parse(raw) {
            Ok(date) => Ok(Some(date)),
            Err(error) => {
                warn!(raw, error = %error, "rejected picked date");
                let guidance = ApplicationError::from(DomainError::from(error)).user_message();
                self.guide(interaction, &guidance).await.map(|()| None)
            }
        }
    }

    fn displayed_or_today(&self, interaction: &Interaction) -> CalendarDate {
        interaction
            .displayed_default
            .as_deref()
            .and_then(|raw| CalendarDate::parse(raw).ok())
            .unwrap_or_else(today)
    }

    async fn guide(&self, interaction: &Interaction, text: &str) -> Result<(), FlowError> {
        self.chat
            .post_ephemeral(
                &interaction.channel_id,
                &interaction.user_id,
                &blocks::error_message(text),
            )
            .await?;
        Ok(())
    }

    async fn lookup_avatar(&self, user_id: &UserId) -> Option<String> {
        match self.directory.profile_image(&user_id.0).await {
            Ok(url) => url,
            Err(error) => {
                // Roster still renders without the picture.
                warn!(user_id = %user_id, error = %error, "avatar lookup failed");
                None
            }
        }
    }
}

fn today() -> CalendarDate {
    let now = Local::now().date_naive();
    let year = u16::try_from(now.year()).unwrap_or(9999);
    let month = u8::try_from(now.month()).unwrap_or(12);
    let day = u8::try_from(now.day()).unwrap_or(28);
    CalendarDate::from_ymd(year, month, day)
        .unwrap_or_else(|_| CalendarDate::from_ymd(2000, 1, 1).unwrap_or_else(|_| unreachable!()))
}
