use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("interactive body is missing the `payload=` parameter")]
    MissingPayload,
    #[error("interactive payload is not valid percent-encoded UTF-8")]
    InvalidEncoding,
    #[error("interactive payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("interactive payload is missing `{name}`")]
    MissingField { name: &'static str },
    #[error("interactive payload carries no actions")]
    NoActions,
}

/// Top-level Events API envelope. Slack retries deliveries, so anything not
/// recognized is reported as unsupported rather than an error.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: CallbackEvent },
    #[serde(other)]
    Unsupported,
}

impl EventEnvelope {
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(body)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub channel: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl CallbackEvent {
    /// A plain channel message typed by a human. Bot messages, message edits
    /// and joins (anything with a subtype), and events without a user are
    /// all filtered out so the bot never responds to itself.
    pub fn as_user_message(&self) -> Option<UserMessage<'_>> {
        if self.event_type != "message" || self.bot_id.is_some() || self.subtype.is_some() {
            return None;
        }

        Some(UserMessage {
            user_id: self.user.as_deref()?,
            channel_id: self.channel.as_deref()?,
            text: self.text.as_deref()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserMessage<'a> {
    pub user_id: &'a str,
    pub channel_id: &'a str,
    pub text: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Button,
    Datepicker,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionAction {
    pub kind: ActionKind,
    pub action_id: String,
    pub value: Option<String>,
    pub selected_date: Option<String>,
}

/// One decoded block-action delivery: who clicked what, where, and what the
/// still-displayed message is currently showing as its picker default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: String,
    pub username: String,
    pub channel_id: String,
    pub message_ts: String,
    pub action: InteractionAction,
    /// First `initial_date` found in the delivered message blocks, used as a
    /// fallback when a picker was never touched before submit.
    pub displayed_default: Option<String>,
}

/// Decodes the `application/x-www-form-urlencoded` interactive body:
/// `payload=<url-encoded JSON>`.
pub fn decode_interaction_body(body: &str) -> Result<Interaction, PayloadError> {
    let encoded = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("payload="))
        .ok_or(PayloadError::MissingPayload)?;

    let json = percent_decode(encoded).ok_or(PayloadError::InvalidEncoding)?;
    parse_interaction_json(&json)
}

fn parse_interaction_json(json: &str) -> Result<Interaction, PayloadError> {
    let raw: RawInteraction = serde_json::from_str(json)?;

    let user = raw.user.ok_or(PayloadError::MissingField { name: "user" })?;
    let user_id = user.id.ok_or(PayloadError::MissingField { name: "user.id" })?;
    let username = user.username.or(user.name).unwrap_or_else(|| user_id.clone());

    let channel_id = raw
        .channel
        .and_then(|channel| channel.id)
        .or(raw.container.as_ref().and_then(|container| container.channel_id.clone()))
        .ok_or(PayloadError::MissingField { name: "channel.id" })?;

    let message_ts = raw
        .message
        .as_ref()
        .and_then(|message| message.ts.clone())
        .or(raw.container.and_then(|container| container.message_ts))
        .ok_or(PayloadError::MissingField { name: "message.ts" })?;

    let action = raw.actions.into_iter().next().ok_or(PayloadError::NoActions)?;
    let action_id = action.action_id.ok_or(PayloadError::MissingField { name: "action_id" })?;
    let kind = match action.action_type.as_deref() {
        Some("button") => ActionKind::Button,
        Some("datepicker") => ActionKind::Datepicker,
        _ => ActionKind::Other,
    };

    let displayed_default = raw
        .message
        .as_ref()
        .and_then(|message| message.blocks.as_ref())
        .and_then(|blocks| find_initial_date(blocks))
        .map(str::to_owned);

    Ok(Interaction {
        user_id,
        username,
        channel_id,
        message_ts,
        action: InteractionAction {
            kind,
            action_id,
            value: action.value,
            selected_date: action.selected_date,
        },
        displayed_default,
    })
}

/// Depth-first scan for the first `initial_date` string in the block tree.
fn find_initial_date(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(date)) = map.get("initial_date") {
                return Some(date);
            }
            map.values().find_map(find_initial_date)
        }
        Value::Array(items) => items.iter().find_map(find_initial_date),
        _ => None,
    }
}

/// Form-encoding decode: `+` is a space, `%XX` is a byte. Any malformed
/// escape rejects the whole payload.
fn percent_decode(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0usize;

    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                if index + 2 >= bytes.len() {
                    return None;
                }

                let high = hex_nibble(bytes[index + 1])?;
                let low = hex_nibble(bytes[index + 2])?;
                decoded.push((high << 4) | low);
                index += 3;
            }
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }

    String::from_utf8(decoded).ok()
}

fn hex_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    user: Option<RawUser>,
    channel: Option<RawChannel>,
    container: Option<RawContainer>,
    message: Option<RawMessage>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<String>,
    username: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContainer {
    channel_id: Option<String>,
    message_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    ts: Option<String>,
    blocks: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: Option<String>,
    action_id: Option<String>,
    value: Option<String>,
    selected_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        decode_interaction_body, ActionKind, EventEnvelope, PayloadError,
    };

    #[test]
    fn url_verification_envelope_exposes_the_challenge() {
        let envelope =
            EventEnvelope::parse(r#"{"type":"url_verification","challenge":"c0ffee"}"#)
                .expect("parse");
        assert!(matches!(
            envelope,
            EventEnvelope::UrlVerification { challenge } if challenge == "c0ffee"
        ));
    }

    #[test]
    fn bot_and_subtype_messages_are_filtered() {
        let bot = EventEnvelope::parse(
            r#"{"type":"event_callback","event":{"type":"message","bot_id":"B1","text":"on call","channel":"C1"}}"#,
        )
        .expect("parse");
        let EventEnvelope::EventCallback { event } = bot else {
            panic!("should be an event callback");
        };
        assert!(event.as_user_message().is_none());

        let edited = EventEnvelope::parse(
            r#"{"type":"event_callback","event":{"type":"message","subtype":"message_changed","user":"U1","text":"on call","channel":"C1"}}"#,
        )
        .expect("parse");
        let EventEnvelope::EventCallback { event } = edited else {
            panic!("should be an event callback");
        };
        assert!(event.as_user_message().is_none());
    }

    #[test]
    fn plain_user_message_is_routable() {
        let envelope = EventEnvelope::parse(
            r#"{"type":"event_callback","event":{"type":"message","user":"U1","text":"on call","channel":"C1"}}"#,
        )
        .expect("parse");
        let EventEnvelope::EventCallback { event } = envelope else {
            panic!("should be an event callback");
        };
        let message = event.as_user_message().expect("routable");
        assert_eq!(message.user_id, "U1");
        assert_eq!(message.text, "on call");
    }

    #[test]
    fn interactive_body_decodes_a_datepicker_action() {
        let payload = r#"{"type":"block_actions","user":{"id":"U1","username":"ada"},"channel":{"id":"C1"},"message":{"ts":"123.456","blocks":[{"type":"actions","elements":[{"type":"datepicker","initial_date":"2024-03-01"}]}]},"actions":[{"type":"datepicker","action_id":"oncall.start.picker.v1","selected_date":"2024-03-05"}]}"#;
        let body = format!("payload={}", form_encode(payload));

        let interaction = decode_interaction_body(&body).expect("decode");
        assert_eq!(interaction.user_id, "U1");
        assert_eq!(interaction.username, "ada");
        assert_eq!(interaction.channel_id, "C1");
        assert_eq!(interaction.message_ts, "123.456");
        assert_eq!(interaction.action.kind, ActionKind::Datepicker);
        assert_eq!(interaction.action.selected_date.as_deref(), Some("2024-03-05"));
        assert_eq!(interaction.displayed_default.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn missing_payload_parameter_fails_closed() {
        assert!(matches!(
            decode_interaction_body("token=abc&team=T1"),
            Err(PayloadError::MissingPayload)
        ));
    }

    #[test]
    fn truncated_percent_escape_fails_closed() {
        assert!(matches!(
            decode_interaction_body("payload=%7B%2"),
            Err(PayloadError::InvalidEncoding)
        ));
    }

    #[test]
    fn payload_without_actions_fails_closed() {
        let payload = r#"{"type":"block_actions","user":{"id":"U1"},"channel":{"id":"C1"},"message":{"ts":"123.456"},"actions":[]}"#;
        let body = format!("payload={}", form_encode(payload));
        assert!(matches!(decode_interaction_body(&body), Err(PayloadError::NoActions)));
    }

    // Minimal encoder for building test bodies; real deliveries come from
    // Slack already encoded.
    fn form_encode(raw: &str) -> String {
        let mut encoded = String::with_capacity(raw.len() * 3);
        for byte in raw.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
                    encoded.push(char::from(byte));
                }
                b' ' => encoded.push('+'),
                other => encoded.push_str(&format!("%{other:02X}")),
            }
        }
        encoded
    }
}
