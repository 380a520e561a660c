use serde::Serialize;

use oncall_core::date::CalendarDate;
use oncall_core::domain::OnCallRecord;

// Versioned action ids so a redesigned control never collides with a stale
// message still sitting in someone's channel history.
pub const START_PICKER_ACTION: &str = "oncall.start.picker.v1";
pub const START_NEXT_ACTION: &str = "oncall.start.next.v1";
pub const START_CANCEL_ACTION: &str = "oncall.start.cancel.v1";
pub const END_PICKER_ACTION: &str = "oncall.end.picker.v1";
pub const END_SUBMIT_ACTION: &str = "oncall.end.submit.v1";
pub const END_CANCEL_ACTION: &str = "oncall.end.cancel.v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button {
        action_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<ButtonStyle>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Datepicker {
        action_id: String,
        initial_date: String,
        placeholder: TextObject,
    },
}

impl ActionElement {
    pub fn button(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Button {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn styled_button(
        action_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyle,
    ) -> Self {
        Self::Button {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: Some(style),
            value: None,
        }
    }

    pub fn datepicker(action_id: impl Into<String>, initial_date: &CalendarDate) -> Self {
        Self::Datepicker {
            action_id: action_id.into(),
            initial_date: initial_date.to_string(),
            placeholder: TextObject::plain("Select a date"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    Image { image_url: String, alt_text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Actions {
        block_id: String,
        elements: Vec<ActionElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Divider {
        block_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<Accessory>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn avatar(&mut self, image_url: impl Into<String>, alt_text: impl Into<String>) -> &mut Self {
        self.accessory =
            Some(Accessory::Image { image_url: image_url.into(), alt_text: alt_text.into() });
        self
    }

    fn build(self) -> (TextObject, Option<Accessory>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn element(&mut self, element: ActionElement) -> &mut Self {
        self.elements.push(element);
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn start_date_prompt(default_date: &CalendarDate) -> MessageTemplate {
    MessageBuilder::new("Pick the first day of your on-call range")
        .section("oncall.start.header.v1", |section| {
            section.mrkdwn("*Schedule on-call time*\nPick the *first* day of your range.");
        })
        .actions("oncall.start.controls.v1", |actions| {
            actions
                .element(ActionElement::datepicker(START_PICKER_ACTION, default_date))
                .element(ActionElement::styled_button(
                    START_NEXT_ACTION,
                    "Next",
                    ButtonStyle::Primary,
                ))
                .element(ActionElement::styled_button(
                    START_CANCEL_ACTION,
                    "Cancel",
                    ButtonStyle::Danger,
                ));
        })
        .build()
}

pub fn end_date_prompt(default_date: &CalendarDate) -> MessageTemplate {
    MessageBuilder::new("Pick the last day of your on-call range")
        .section("oncall.end.header.v1", |section| {
            section.mrkdwn("Now pick the *last* day of your range.");
        })
        .actions("oncall.end.controls.v1", |actions| {
            actions
                .element(ActionElement::datepicker(END_PICKER_ACTION, default_date))
                .element(ActionElement::styled_button(
                    END_SUBMIT_ACTION,
                    "Submit",
                    ButtonStyle::Primary,
                ))
                .element(ActionElement::styled_button(
                    END_CANCEL_ACTION,
                    "Cancel",
                    ButtonStyle::Danger,
                ));
        })
        .build()
}

pub fn cancelled_ack() -> MessageTemplate {
    MessageBuilder::new("On-call scheduling cancelled")
        .section("oncall.cancel.ack.v1", |section| {
            section.plain("Okay, nothing was scheduled. Send `on call` whenever you're ready.");
        })
        .build()
}

pub fn submit_ack(range: &str, settle_minutes: u64) -> MessageTemplate {
    MessageBuilder::new(format!("Scheduling in progress: {range}"))
        .section("oncall.submit.ack.v1", |section| {
            section.mrkdwn(format!(
                ":hourglass_flowing_sand: Scheduling you on call *{range}*."
            ));
        })
        .context("oncall.submit.context.v1", |context| {
            context.plain(format!(
                "Allow up to {settle_minutes} minutes for it to appear in `view on call`."
            ));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("On-call scheduler help")
        .section("oncall.help.summary.v1", |section| {
            section.mrkdwn(
                "*What I understand*\n\
                 • `on call` — schedule a new on-call range\n\
                 • `view on call` — see everyone's upcoming ranges\n\
                 • `view me` — see your own record (only you see the reply)\n\
                 • `reset on call` — clear your scheduled range\n\
                 • `help me schedule` — this message",
            );
        })
        .context("oncall.help.context.v1", |context| {
            context.plain("Messages must match exactly, including case.");
        })
        .build()
}

pub fn reset_ack() -> MessageTemplate {
    MessageBuilder::new("On-call range cleared")
        .section("oncall.reset.ack.v1", |section| {
            section.plain("Your on-call range was cleared.");
        })
        .build()
}

pub fn error_message(summary: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("oncall.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .build()
}

/// Roster entry paired with the avatar looked up from the user directory.
pub struct RosterEntry {
    pub record: OnCallRecord,
    pub avatar_url: Option<String>,
}

pub fn roster_message(entries: &[RosterEntry]) -> MessageTemplate {
    let scheduled: Vec<&RosterEntry> =
        entries.iter().filter(|entry| entry.record.is_scheduled()).collect();

    if scheduled.is_empty() {
        return MessageBuilder::new("Nobody is scheduled for on-call time")
            .section("oncall.roster.empty.v1", |section| {
                section.plain("Nobody is scheduled yet. Send `on call` to claim a range.");
            })
            .build();
    }

    let mut builder = MessageBuilder::new("Upcoming on-call schedule")
        .section("oncall.roster.header.v1", |section| {
            section.mrkdwn("*Upcoming on-call schedule*");
        })
        .divider("oncall.roster.rule.v1");

    for (index, entry) in scheduled.iter().enumerate() {
        let words = record_range_in_words(&entry.record).unwrap_or_default();
        let name = entry.record.display_name.clone();
        let avatar = entry.avatar_url.clone();
        builder = builder.section(format!("oncall.roster.entry.{}.v1", index + 1), |section| {
            section.mrkdwn(format!("*{name}*\n{words}"));
            if let Some(url) = avatar {
                section.avatar(url, name);
            }
        });
    }

    builder.build()
}

pub fn view_me_message(record: &OnCallRecord) -> MessageTemplate {
    match record_range_in_words(record) {
        Some(words) => MessageBuilder::new("Your on-call record")
            .section("oncall.me.summary.v1", |section| {
                section.mrkdwn(format!("You're on call *{words}*."));
            })
            .build(),
        None => MessageBuilder::new("Your on-call record")
            .section("oncall.me.summary.v1", |section| {
                section.plain("You have no on-call range scheduled. Send `on call` to pick one.");
            })
            .build(),
    }
}

/// `2024-03-01 .. 2024-03-10` rendered as
/// "March 1, 2024 through March 10, 2024".
pub fn format_range_in_words(start: &CalendarDate, end: &CalendarDate) -> String {
    format!("{} through {}", date_in_words(start), date_in_words(end))
}

fn record_range_in_words(record: &OnCallRecord) -> Option<String> {
    match (&record.start_date, &record.end_date) {
        (Some(start), Some(end)) if record.is_scheduled() => {
            Some(format_range_in_words(start, end))
        }
        _ => None,
    }
}

fn date_in_words(date: &CalendarDate) -> String {
    format!("{} {}, {}", month_name(date.month()), date.day(), date.year())
}

fn month_name(month: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    NAMES.get(usize::from(month).wrapping_sub(1)).copied().unwrap_or("Unknown")
}
