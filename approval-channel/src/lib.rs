use chirp_core::{ApprovalError, CoreError, ReplyDraft, TelegramSettings};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_TELEGRAM_BASE: &str = "https://api.telegram.org";
const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Human verdict on a submitted draft batch. The decision applies to the
/// first draft; the rest stay unhandled and come back on a later run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved { post_id: String },
    Rejected,
    TimedOut,
}

/// Channel that puts drafts in front of a human and reports back.
pub trait ApprovalChannel {
    async fn submit_drafts(&self, drafts: &[ReplyDraft]) -> Result<ApprovalDecision, CoreError>;

    /// Best-effort status/error notification; failures are swallowed.
    async fn notify(&self, text: &str);
}

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: i64,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    data: Option<String>,
    message: Option<Message>,
}

pub struct TelegramChannel {
    http_client: reqwest::Client,
    settings: TelegramSettings,
    base_url: String,
    decision_timeout: Duration,
    poll_interval: Duration,
}

impl TelegramChannel {
    pub fn new(settings: TelegramSettings) -> Result<Self, CoreError> {
        Self::with_base_url(settings, DEFAULT_TELEGRAM_BASE)
    }

    /// Custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(settings: TelegramSettings, base_url: &str) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            settings,
            base_url: base_url.trim_end_matches('/').to_string(),
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Shortens the decision window; used by tests.
    pub fn with_timeouts(mut self, decision_timeout: Duration, poll_interval: Duration) -> Self {
        self.decision_timeout = decision_timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn endpoint(&self, call: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.settings.bot_token, call)
    }

    async fn send_message(
        &self,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, CoreError> {
        let request = SendMessageRequest {
            chat_id: self.settings.chat_id,
            text,
            reply_markup,
        };

        let response = self
            .http_client
            .post(self.endpoint("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(CoreError::Network)?;

        if !response.status().is_success() {
            return Err(CoreError::Approval(ApprovalError::DeliveryFailed {
                reason: format!("sendMessage returned {}", response.status()),
            }));
        }

        let envelope: ApiEnvelope<Message> = response.json().await.map_err(|_| {
            CoreError::Approval(ApprovalError::InvalidResponse {
                details: "sendMessage response was not valid JSON".to_string(),
            })
        })?;

        match envelope.result {
            Some(message) if envelope.ok => Ok(message),
            _ => Err(CoreError::Approval(ApprovalError::DeliveryFailed {
                reason: "sendMessage reported ok=false".to_string(),
            })),
        }
    }

    async fn poll_for_decision(&self, message_id: i64) -> Result<ApprovalDecision, CoreError> {
        let deadline = Instant::now() + self.decision_timeout;
        let mut offset: Option<i64> = None;

        info!("Waiting for approval decision");
        while Instant::now() < deadline {
            let mut request = self
                .http_client
                .get(self.endpoint("getUpdates"))
                .query(&[("timeout", "5")]);
            if let Some(offset) = offset {
                request = request.query(&[("offset", offset.to_string())]);
            }

            let updates: Vec<Update> = match request.send().await {
                Ok(response) => match response.json::<ApiEnvelope<Vec<Update>>>().await {
                    Ok(envelope) => envelope.result.unwrap_or_default(),
                    Err(e) => {
                        warn!("Ignoring unparseable getUpdates response: {}", e);
                        Vec::new()
                    }
                },
                Err(e) => {
                    // Transient poll failures just shorten the window
                    warn!("getUpdates failed: {}", e);
                    Vec::new()
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                let Some(callback) = update.callback_query else {
                    continue;
                };
                if callback.message.as_ref().map(|m| m.message_id) != Some(message_id) {
                    continue;
                }
                let Some(data) = callback.data else { continue };

                self.answer_callback(&callback.id).await;

                if let Some(post_id) = data.strip_prefix("approve:") {
                    return Ok(ApprovalDecision::Approved {
                        post_id: post_id.to_string(),
                    });
                }
                if data.starts_with("skip:") {
                    return Ok(ApprovalDecision::Rejected);
                }
                debug!("Ignoring unknown callback payload: {}", data);
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Ok(ApprovalDecision::TimedOut)
    }

    async fn answer_callback(&self, callback_id: &str) {
        let body = serde_json::json!({
            "callback_query_id": callback_id,
            "text": "Got it",
        });
        if let Err(e) = self
            .http_client
            .post(self.endpoint("answerCallbackQuery"))
            .json(&body)
            .send()
            .await
        {
            warn!("answerCallbackQuery failed: {}", e);
        }
    }
}

impl ApprovalChannel for TelegramChannel {
    async fn submit_drafts(&self, drafts: &[ReplyDraft]) -> Result<ApprovalDecision, CoreError> {
        let first = drafts.first().ok_or_else(|| CoreError::InvalidInput {
            message: "no drafts to submit for approval".to_string(),
        })?;

        let mut text = String::from("Reply drafts\n\n");
        for draft in drafts {
            text.push_str(&format!("- {}: {}\n", draft.post_id, draft.text));
        }

        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton {
                    text: "Approve".to_string(),
                    callback_data: format!("approve:{}", first.post_id),
                },
                InlineKeyboardButton {
                    text: "Skip".to_string(),
                    callback_data: format!("skip:{}", first.post_id),
                },
            ]],
        };

        let message = self.send_message(text, Some(keyboard)).await?;
        info!("Submitted {} draft(s) for approval", drafts.len());
        self.poll_for_decision(message.message_id).await
    }

    async fn notify(&self, text: &str) {
        // Notification loss is acceptable; the run outcome is the source of
        // truth
        let message: String = text.chars().take(4000).collect();
        if let Err(e) = self.send_message(message, None).await {
            warn!("Notification delivery failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::ApprovalStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> TelegramSettings {
        TelegramSettings {
            bot_token: "test-token".to_string(),
            chat_id: 42,
        }
    }

    fn draft(post_id: &str) -> ReplyDraft {
        ReplyDraft {
            post_id: post_id.to_string(),
            author: "bigvoice".to_string(),
            text: "Retention beats reach.".to_string(),
            source_text: "KOL campaigns everywhere".to_string(),
            url: format!("https://x.com/bigvoice/status/{post_id}"),
            status: ApprovalStatus::Pending,
        }
    }

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::with_base_url(settings(), &server.uri())
            .unwrap()
            .with_timeouts(Duration::from_secs(3), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_approval_flow_returns_approved_post_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": {"message_id": 9}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 1,
                    "callback_query": {
                        "id": "cb1",
                        "data": "approve:100",
                        "message": {"message_id": 9}
                    }
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/answerCallbackQuery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let decision = channel(&server)
            .submit_drafts(&[draft("100")])
            .await
            .unwrap();
        assert_eq!(
            decision,
            ApprovalDecision::Approved {
                post_id: "100".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_skip_callback_is_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": {"message_id": 9}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 1,
                    "callback_query": {
                        "id": "cb1",
                        "data": "skip:100",
                        "message": {"message_id": 9}
                    }
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/answerCallbackQuery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let decision = channel(&server)
            .submit_drafts(&[draft("100")])
            .await
            .unwrap();
        assert_eq!(decision, ApprovalDecision::Rejected);
    }

    #[tokio::test]
    async fn test_no_callback_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": {"message_id": 9}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": []
            })))
            .mount(&server)
            .await;

        let channel = TelegramChannel::with_base_url(settings(), &server.uri())
            .unwrap()
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(20));

        let decision = channel.submit_drafts(&[draft("100")]).await.unwrap();
        assert_eq!(decision, ApprovalDecision::TimedOut);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_an_approval_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let error = channel(&server)
            .submit_drafts(&[draft("100")])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::Approval(ApprovalError::DeliveryFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_targets_configured_chat() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(json!({"chat_id": 42})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": {"message_id": 9}
            })))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server).notify("run finished").await;
    }
}
