use anyhow::Context;
use approval_channel::TelegramChannel;
use chirp_core::{BotConfig, CoreError};
use clap::Parser;
use llm_interface::{OpenAiWriter, ReplyWriter, Tone, ToneBankWriter};
use platform_client::PlatformApiClient;
use reply_pipeline::{AbortCause, Pipeline, RunSummary};
use state_store::{PendingStore, SeenStore};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "chirp")]
#[command(about = "Automated reply agent for high-engagement posts")]
struct Cli {
    /// Log intended posts without any posting side effect
    #[arg(long)]
    dry_run: bool,

    /// Reply to one specific post id instead of discovering candidates
    #[arg(long)]
    target: Option<String>,

    /// Run repeatedly with this many minutes between runs
    #[arg(long)]
    interval_minutes: Option<u64>,
}

/// Composer selected at startup: the LLM provider when a key is configured,
/// the offline tone bank otherwise.
enum Writer {
    OpenAi(OpenAiWriter),
    ToneBank(ToneBankWriter),
}

impl ReplyWriter for Writer {
    async fn write_reply(
        &self,
        source_text: &str,
        tone_hint: Option<Tone>,
    ) -> Result<String, CoreError> {
        match self {
            Writer::OpenAi(w) => w.write_reply(source_text, tone_hint).await,
            Writer::ToneBank(w) => w.write_reply(source_text, tone_hint).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chirp=info,reply_pipeline=info,platform_client=info,llm_interface=info,\
                 approval_channel=info,state_store=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = BotConfig::from_env()
        .map_err(CoreError::Config)
        .context("configuration is invalid, no run was attempted")?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.target.is_some() {
        config.target_post_id = cli.target;
    }
    if cli.interval_minutes.is_some() {
        config.poll_interval_minutes = cli.interval_minutes;
    }

    tracing::info!(
        "Starting chirp: topics={:?}, dry_run={}, mode={:?}",
        config.filter.topics,
        config.dry_run,
        config.mode
    );

    let client = PlatformApiClient::new(config.platform.clone())?;
    let approval = match &config.telegram {
        Some(settings) => Some(TelegramChannel::new(settings.clone())?),
        None => None,
    };
    let writer = match &config.llm.api_key {
        Some(api_key) => Writer::OpenAi(OpenAiWriter::new(
            api_key.clone(),
            config.llm.model.clone(),
        )?),
        None => {
            tracing::warn!("No LLM API key configured, using the offline tone bank");
            Writer::ToneBank(ToneBankWriter)
        }
    };

    match config.poll_interval_minutes {
        Some(minutes) if minutes > 0 => {
            let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
            loop {
                interval.tick().await;
                let summary = run_once(&config, &client, &writer, approval.as_ref()).await;
                log_summary(&summary);

                match summary.aborted {
                    Some(AbortCause::AuthenticationFailed { reason }) => {
                        anyhow::bail!("authentication failed, stopping: {reason}");
                    }
                    Some(AbortCause::PermissionDenied { reason }) => {
                        anyhow::bail!("permission denied, stopping: {reason}");
                    }
                    Some(AbortCause::Configuration { reason }) => {
                        anyhow::bail!("configuration error, stopping: {reason}");
                    }
                    Some(AbortCause::RateLimited { retry_after_secs }) => {
                        tracing::warn!(
                            "Rate limited, holding off for {} seconds",
                            retry_after_secs
                        );
                        tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                    }
                    _ => {}
                }
            }
        }
        _ => {
            let summary = run_once(&config, &client, &writer, approval.as_ref()).await;
            log_summary(&summary);

            match summary.aborted {
                Some(AbortCause::AuthenticationFailed { reason }) => {
                    anyhow::bail!("authentication failed: {reason}");
                }
                Some(AbortCause::PermissionDenied { reason }) => {
                    anyhow::bail!("permission denied: {reason}");
                }
                Some(AbortCause::Configuration { reason }) => {
                    anyhow::bail!("configuration error: {reason}");
                }
                // A rate-limited or transport-failed run is a skipped run,
                // not a crash; the next scheduled invocation retries
                _ => Ok(()),
            }
        }
    }
}

async fn run_once<W: ReplyWriter>(
    config: &BotConfig,
    client: &PlatformApiClient,
    writer: &W,
    approval: Option<&TelegramChannel>,
) -> RunSummary {
    let mut seen = SeenStore::load(&config.state_path);
    let mut pending = PendingStore::load(&config.pending_path);
    tracing::info!(
        "Loaded state: {} replied, {} pending approval",
        seen.len(),
        pending.len()
    );

    let pipeline = Pipeline::new(config, client, writer, client, approval);
    pipeline.run(&mut seen, &mut pending).await
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        "Run summary: discovered={} drafted={} posted={} pending={} rejected={} \
         skipped={} dropped={} dry_run_logged={} failed={}",
        summary.discovered,
        summary.drafted,
        summary.posted,
        summary.pending,
        summary.rejected,
        summary.skipped_seen,
        summary.dropped_invalid,
        summary.dry_run_logged,
        summary.failed
    );
    for error in &summary.errors {
        tracing::warn!("Run error: {}", error);
    }
}
