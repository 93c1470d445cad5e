pub mod tone;

use chirp_core::{CoreError, LlmError, MAX_REPLY_CHARS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub use tone::{detect_tone, extract_keywords, Tone};

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";
const MAX_COMPLETION_TOKENS: u32 = 90;

/// Drafts one short reply to a source post.
pub trait ReplyWriter {
    async fn write_reply(
        &self,
        source_text: &str,
        tone_hint: Option<Tone>,
    ) -> Result<String, CoreError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiWriter {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiWriter {
    pub fn new(api_key: String, model: String) -> Result<Self, CoreError> {
        Self::with_base_url(api_key, model, DEFAULT_OPENAI_BASE)
    }

    /// Custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_system_prompt(tone: Tone, keywords: &[String]) -> String {
        let anchors = keywords
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = String::from(
            "You are Chirp, the public voice of a growth studio.\n\
             You reply ONLY if you can find a real connection to the post.\n\
             If the post is not about growth, creators, crypto, or technology,\n\
             reply with a witty but neutral observation.\n\
             \n\
             Rules:\n\
             - <= 200 characters\n\
             - Reference the actual content of the post first\n\
             - Never insult, never sell\n\
             - Output ONLY the final one-line reply without hashtags or links\n",
        );
        prompt.push_str(&format!(
            "- Use the {} tone: {}\n",
            tone.as_str().to_uppercase(),
            tone.style_line()
        ));
        if !anchors.is_empty() {
            prompt.push_str(&format!(
                "- Explicitly reference at least ONE of these keywords: {anchors}\n"
            ));
        }
        prompt
    }
}

impl ReplyWriter for OpenAiWriter {
    async fn write_reply(
        &self,
        source_text: &str,
        tone_hint: Option<Tone>,
    ) -> Result<String, CoreError> {
        let source = source_text.trim();
        if source.is_empty() {
            return Ok("Not much to react to here - what outcome are you aiming for?".to_string());
        }

        let tone = tone_hint.unwrap_or_else(|| detect_tone(source));
        let keywords = extract_keywords(source, 5);
        debug!("Drafting reply with tone {} anchors {:?}", tone.as_str(), keywords);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::build_system_prompt(tone, &keywords),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Post:\n{source}\n\nWrite one short, context-anchored reply:"),
                },
            ],
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: 0.7,
            presence_penalty: 0.1,
            frequency_penalty: 0.2,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = match status.as_u16() {
                401 => LlmError::InvalidApiKey {
                    provider: PROVIDER.to_string(),
                },
                429 => LlmError::RateLimitExceeded {
                    provider: PROVIDER.to_string(),
                    retry_after: response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(30),
                },
                code if status.is_server_error() => LlmError::ServiceUnavailable {
                    provider: format!("{PROVIDER} (status {code})"),
                },
                _ => LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                },
            };
            return Err(CoreError::Llm(error));
        }

        let completion: ChatResponse = response.json().await.map_err(|_| {
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let bounded = bound_reply(&text);
        if bounded.is_empty() {
            return Err(CoreError::Llm(LlmError::EmptyCompletion {
                provider: PROVIDER.to_string(),
            }));
        }

        info!("Drafted reply ({} chars)", bounded.chars().count());
        Ok(bounded)
    }
}

/// Collapses whitespace runs to single spaces and truncates to the reply
/// length bound at a character boundary.
pub fn bound_reply(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_REPLY_CHARS).collect()
}

const PLAYFUL_BANK: &[&str] = &[
    "Vanity metrics called; they want their dignity back.",
    "Maybe engagement farming is the new cardio?",
    "Keep the hype; we'll keep the retention curve.",
];

const STRATEGIC_BANK: &[&str] = &[
    "Imagine if numbers translated to real traction. Wild thought.",
    "Real talk - what metric actually matters to you lately?",
    "Curious how many of these followers even blink at the product.",
];

const COSMIC_BANK: &[&str] = &[
    "Some chase clout. Others find a smarter orbit.",
    "Growth theatre is fun until gravity shows up.",
    "Ever wonder what happens when momentum actually means results?",
];

/// Offline canned-reply writer for development and tests. No network, no
/// keys; picks a line matching the detected tone.
pub struct ToneBankWriter;

impl ReplyWriter for ToneBankWriter {
    async fn write_reply(
        &self,
        source_text: &str,
        tone_hint: Option<Tone>,
    ) -> Result<String, CoreError> {
        let tone = tone_hint.unwrap_or_else(|| detect_tone(source_text));
        let bank = match tone {
            Tone::Playful => PLAYFUL_BANK,
            Tone::Strategic => STRATEGIC_BANK,
            Tone::Cosmic => COSMIC_BANK,
        };
        Ok(bank[fastrand::usize(..bank.len())].to_string())
    }
}
