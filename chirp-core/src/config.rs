use crate::error::ConfigError;
use crate::types::SearchFilter;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a drafted reply goes once the dry-run gate is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Route through the human approval channel.
    Approval,
    /// Post immediately without review.
    Direct,
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approval" => Ok(DispatchMode::Approval),
            "direct" => Ok(DispatchMode::Direct),
            _ => Err(ConfigError::InvalidValue {
                field: "DISPATCH_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct PlatformCredentials {
    pub bearer_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("bearer_token", &"[redacted]")
            .field("client_id", &self.client_id.as_ref().map(|_| "[redacted]"))
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("redirect_url", &self.redirect_url)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub tone: Option<String>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("tone", &self.tone)
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: i64,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"[redacted]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub filter: SearchFilter,
    pub max_posts: usize,
    pub dry_run: bool,
    pub mode: DispatchMode,
    pub target_post_id: Option<String>,
    pub state_path: PathBuf,
    pub pending_path: PathBuf,
    pub poll_interval_minutes: Option<u64>,
    pub platform: PlatformCredentials,
    pub llm: LlmSettings,
    pub telegram: Option<TelegramSettings>,
}

impl BotConfig {
    /// Builds and validates the full configuration from the environment.
    /// Fails before any network call is made.
    pub fn from_env() -> Result<Self, ConfigError> {
        let topics = parse_list(&env::var("TOPICS").unwrap_or_default());
        if topics.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "TOPICS must contain at least one search topic".to_string(),
            });
        }

        let kol_terms = match env::var("KOL_TERMS") {
            Ok(raw) => parse_list(&raw),
            Err(_) => SearchFilter::default().kol_terms,
        };

        let filter = SearchFilter {
            topics,
            kol_terms,
            min_replies: parse_var("MIN_REPLIES", 10)?,
            min_faves: parse_var("MIN_FAVES", 10)?,
            window_hours: parse_var("SEARCH_HOURS", 12)?,
            ..SearchFilter::default()
        };

        let dry_run = parse_bool_var("DRY_RUN", true)?;
        let mode = match env::var("DISPATCH_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => DispatchMode::Approval,
        };

        let platform = PlatformCredentials {
            bearer_token: require_var("PLATFORM_BEARER_TOKEN")?,
            client_id: env::var("PLATFORM_CLIENT_ID").ok(),
            client_secret: env::var("PLATFORM_CLIENT_SECRET").ok(),
            redirect_url: env::var("PLATFORM_REDIRECT_URL").ok(),
            refresh_token: env::var("PLATFORM_REFRESH_TOKEN").ok(),
        };

        if !dry_run {
            let mut missing = Vec::new();
            if platform.client_id.is_none() {
                missing.push("PLATFORM_CLIENT_ID");
            }
            if platform.client_secret.is_none() {
                missing.push("PLATFORM_CLIENT_SECRET");
            }
            if platform.redirect_url.is_none() {
                missing.push("PLATFORM_REDIRECT_URL");
            }
            if platform.refresh_token.is_none() {
                missing.push("PLATFORM_REFRESH_TOKEN");
            }
            if !missing.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: format!(
                        "Missing required posting credentials: {}",
                        missing.join(", ")
                    ),
                });
            }
        }

        let telegram = match (env::var("TELEGRAM_BOT_TOKEN"), env::var("TELEGRAM_CHAT_ID")) {
            (Ok(bot_token), Ok(chat_id_raw)) => {
                let chat_id =
                    chat_id_raw
                        .parse::<i64>()
                        .map_err(|_| ConfigError::InvalidValue {
                            field: "TELEGRAM_CHAT_ID".to_string(),
                            value: chat_id_raw,
                        })?;
                Some(TelegramSettings { bot_token, chat_id })
            }
            _ => None,
        };

        if mode == DispatchMode::Approval && !dry_run && telegram.is_none() {
            return Err(ConfigError::ValidationFailed {
                reason: "Approval mode requires TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID"
                    .to_string(),
            });
        }

        Ok(Self {
            filter,
            max_posts: parse_var("MAX_POSTS", 1)?,
            dry_run,
            mode,
            target_post_id: env::var("TARGET_POST_ID").ok().filter(|v| !v.is_empty()),
            state_path: env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("state.json")),
            pending_path: env::var("PENDING_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pending_approvals.json")),
            poll_interval_minutes: match env::var("POLL_INTERVAL_MINUTES") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "POLL_INTERVAL_MINUTES".to_string(),
                    value: raw,
                })?),
                Err(_) => None,
            },
            platform,
            llm: LlmSettings {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty()),
                model: env::var("CHIRP_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                tone: env::var("CHIRP_TONE").ok().filter(|v| !v.is_empty()),
            },
            telegram,
        })
    }
}

/// Splits a comma-separated env value, trimming and dropping blank entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bool_var(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_bool(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
            var_name: name.to_string(),
        })
}
