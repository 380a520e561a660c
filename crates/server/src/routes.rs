use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use secrecy::SecretString;
use tracing::{info, warn};

use oncall_slack::flow::SchedulingFlow;
use oncall_slack::payload::{decode_interaction_body, EventEnvelope};
use oncall_slack::SlackApiClient;

use crate::service::BufferedScheduleService;
use crate::signature;

pub type AppFlow = SchedulingFlow<SlackApiClient, SlackApiClient, BufferedScheduleService>;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AppFlow>,
    pub signing_secret: SecretString,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/interactive", post(slack_interactive))
        .with_state(state)
}

/// Events API webhook: URL verification challenges and channel messages.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    if let Err(error) = check_signature(&state, &headers, &body) {
        warn!(error = %error, "rejected events delivery");
        return (StatusCode::UNAUTHORIZED, "invalid signature".to_string());
    }

    let envelope = match EventEnvelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(error = %error, "unparseable events body");
            return (StatusCode::BAD_REQUEST, "bad request".to_string());
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("answered url verification challenge");
            (StatusCode::OK, challenge)
        }
        EventEnvelope::EventCallback { event } => {
            if let Some(message) = event.as_user_message() {
                if let Err(error) = state
                    .flow
                    .handle_message(message.user_id, message.channel_id, message.text)
                    .await
                {
                    // Slack retries on non-2xx; the failure is ours to log,
                    // not the sender's to redeliver.
                    warn!(error = %error, "message handling failed");
                }
            }
            (StatusCode::OK, "ok".to_string())
        }
        EventEnvelope::Unsupported => (StatusCode::OK, "ignored".to_string()),
    }
}

/// Interactivity webhook: block actions from the scheduling prompts.
pub async fn slack_interactive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    if let Err(error) = check_signature(&state, &headers, &body) {
        warn!(error = %error, "rejected interactive delivery");
        return (StatusCode::UNAUTHORIZED, "invalid signature".to_string());
    }

    let interaction = match decode_interaction_body(&body) {
        Ok(interaction) => interaction,
        Err(error) => {
            // The raw body is the only clue to what Slack actually sent.
            warn!(error = %error, body = %body, "undecodable interactive payload");
            return (StatusCode::OK, "action unsuccessful".to_string());
        }
    };

    match state.flow.handle_interaction(interaction).await {
        Ok(()) => (StatusCode::OK, "action successful".to_string()),
        Err(error) => {
            warn!(error = %error, "interaction handling failed");
            (StatusCode::OK, "action unsuccessful".to_string())
        }
    }
}

fn check_signature(
    state: &AppState,
    headers: &HeaderMap,
    body: &str,
) -> Result<(), signature::SignatureError> {
    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|value| value.to_str().ok());
    let signed = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    signature::verify(&state.signing_secret, timestamp, signed, body, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use secrecy::SecretString;
    use sha2::Sha256;

    use oncall_core::pending::PendingSelectionStore;
    use oncall_db::{InMemoryOnCallRepository, ScheduleWriter};
    use oncall_slack::flow::SchedulingFlow;
    use oncall_slack::SlackApiClient;

    use crate::service::BufferedScheduleService;

    use super::{slack_events, slack_interactive, AppState};

    const SIGNING_SECRET: &str = "test-signing-secret";

    fn state() -> AppState {
        let writer =
            Arc::new(ScheduleWriter::new(Arc::new(InMemoryOnCallRepository::default()), 3));
        let client = SlackApiClient::new(
            SecretString::from("xoxb-test"),
            SecretString::from("xoxp-test"),
        );
        let flow = SchedulingFlow::new(
            client.clone(),
            client,
            BufferedScheduleService::new(writer),
            Arc::new(PendingSelectionStore::new()),
            10,
        );
        AppState { flow: Arc::new(flow), signing_secret: SecretString::from(SIGNING_SECRET) }
    }

    fn signed_headers(body: &str) -> HeaderMap {
        let timestamp = Utc::now().timestamp().to_string();
        let mut mac =
            Hmac::<Sha256>::new_from_slice(SIGNING_SECRET.as_bytes()).expect("key");
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-slack-request-timestamp",
            HeaderValue::from_str(&timestamp).expect("timestamp header"),
        );
        headers.insert(
            "x-slack-signature",
            HeaderValue::from_str(&format!("v0={hex}")).expect("signature header"),
        );
        headers
    }

    #[tokio::test]
    async fn unsigned_deliveries_are_unauthorized() {
        let body = r#"{"type":"url_verification","challenge":"c0ffee"}"#.to_string();
        let (status, _) =
            slack_events(axum::extract::State(state()), HeaderMap::new(), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let body = r#"{"type":"url_verification","challenge":"c0ffee"}"#.to_string();
        let headers = signed_headers(&body);
        let (status, text) = slack_events(axum::extract::State(state()), headers, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "c0ffee");
    }

    #[tokio::test]
    async fn bot_messages_are_acknowledged_without_processing() {
        let body = r#"{"type":"event_callback","event":{"type":"message","bot_id":"B1","text":"on call","channel":"C1"}}"#.to_string();
        let headers = signed_headers(&body);
        let (status, text) = slack_events(axum::extract::State(state()), headers, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn malformed_interactive_payload_is_answered_unsuccessful() {
        let body = "payload=%zz".to_string();
        let headers = signed_headers(&body);
        let (status, text) =
            slack_interactive(axum::extract::State(state()), headers, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "action unsuccessful");
    }
}
