
use approval_channel::{ApprovalChannel, ApprovalDecision};
use chirp_core::{
    ApprovalStatus, BotConfig, CandidatePost, CandidateState, CoreError, DispatchMode,
    PlatformApiError, ReplyDraft, MAX_REPLY_CHARS,
};
use llm_interface::{bound_reply, ReplyWriter, Tone};
use platform_client::{PostSearch, ReplyPoster};
use state_store::{PendingStore, SeenStore};
use tracing::{debug, error, info, warn};

/// Why a run stopped before working through discovery and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    RateLimited { retry_after_secs: u64 },
    AuthenticationFailed { reason: String },
    PermissionDenied { reason: String },
    Configuration { reason: String },
    Transport { message: String },
}

/// Outcome of a single pipeline run. Collaborator errors land here as
/// counters and messages; they never escape as panics.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub discovered: usize,
    pub drafted: usize,
    pub posted: usize,
    pub pending: usize,
    pub rejected: usize,
    pub skipped_seen: usize,
    pub dropped_invalid: usize,
    pub dry_run_logged: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub aborted: Option<AbortCause>,
}

impl RunSummary {
    pub fn had_failures(&self) -> bool {
        self.failed > 0 || self.aborted.is_some()
    }
}

/// One sequential discover -> dedup -> draft -> dispatch pass.
///
/// All collaborators are injected by reference, as is the persisted state,
/// so the run logic owns no ambient resources.
pub struct Pipeline<'a, S, W, P, A> {
    config: &'a BotConfig,
    search: &'a S,
    writer: &'a W,
    poster: &'a P,
    approval: Option<&'a A>,
}

impl<'a, S, W, P, A> Pipeline<'a, S, W, P, A>
where
    S: PostSearch,
    W: ReplyWriter,
    P: ReplyPoster,
    A: ApprovalChannel,
{
    pub fn new(
        config: &'a BotConfig,
        search: &'a S,
        writer: &'a W,
        poster: &'a P,
        approval: Option<&'a A>,
    ) -> Self {
        Self {
            config,
            search,
            writer,
            poster,
            approval,
        }
    }

    pub async fn run(&self, seen: &mut SeenStore, pending: &mut PendingStore) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(
            "Starting run (dry_run={}, mode={:?}, max_posts={})",
            self.config.dry_run, self.config.mode, self.config.max_posts
        );

        // Phase 1: publish a draft approved on an earlier run
        self.flush_pending(seen, pending, &mut summary).await;

        // Phase 2: discovery and dispatch
        let candidates = match self.discover().await {
            Ok(candidates) => candidates,
            Err(error) => {
                self.record_abort(error, &mut summary);
                return summary;
            }
        };
        summary.discovered = candidates.len();
        info!("Discovered {} candidate(s)", candidates.len());

        let mut dispatched = 0;
        for candidate in &candidates {
            if dispatched >= self.config.max_posts.max(1) {
                break;
            }
            let state = self
                .process_candidate(candidate, seen, pending, &mut summary)
                .await;
            debug!("Candidate {} finished as {:?}", candidate.id, state);
            if matches!(
                state,
                CandidateState::Posted { .. }
                    | CandidateState::PendingApproval
                    | CandidateState::DryRunLogged
            ) {
                dispatched += 1;
            }
        }

        info!(
            "Run complete: posted={}, pending={}, skipped={}, failed={}",
            summary.posted, summary.pending, summary.skipped_seen, summary.failed
        );
        summary
    }

    async fn discover(&self) -> Result<Vec<CandidatePost>, CoreError> {
        if let Some(target) = &self.config.target_post_id {
            info!("Manual target override, skipping discovery: {}", target);
            return Ok(vec![self.search.get_post(target).await?]);
        }

        // Overfetch so already-handled candidates do not starve the cap
        let limit = self.config.max_posts.max(1) * 3;
        self.search.search_recent(&self.config.filter, limit).await
    }

    async fn process_candidate(
        &self,
        candidate: &CandidatePost,
        seen: &mut SeenStore,
        pending: &mut PendingStore,
        summary: &mut RunSummary,
    ) -> CandidateState {
        if seen.contains(&candidate.id) || pending.contains(&candidate.id) {
            debug!("Skipping {} (already handled)", candidate.id);
            summary.skipped_seen += 1;
            return CandidateState::SkippedSeen;
        }

        let tone_hint: Option<Tone> = self
            .config
            .llm
            .tone
            .as_deref()
            .and_then(|raw| raw.parse().ok());

        let text = match self.writer.write_reply(&candidate.text, tone_hint).await {
            Ok(text) => text,
            Err(error) => {
                warn!("Drafting failed for {}: {}", candidate.id, error);
                summary.failed += 1;
                summary.errors.push(format!("draft {}: {error}", candidate.id));
                return CandidateState::Failed {
                    reason: error.to_string(),
                };
            }
        };

        let draft = match self.make_draft(candidate, text) {
            Ok(draft) => draft,
            Err(reason) => {
                warn!("Dropping draft for {}: {}", candidate.id, reason);
                summary.dropped_invalid += 1;
                return CandidateState::DroppedInvalid { reason };
            }
        };
        summary.drafted += 1;

        self.dispatch(draft, seen, pending, summary).await
    }

    /// Builds the dispatchable draft, enforcing the length bound. Truncates
    /// over-length text; an empty draft is invalid and dropped.
    fn make_draft(&self, candidate: &CandidatePost, text: String) -> Result<ReplyDraft, String> {
        let mut text = text;
        if text.chars().count() > MAX_REPLY_CHARS {
            warn!(
                "Draft for {} over length ({} chars), truncating",
                candidate.id,
                text.chars().count()
            );
            text = bound_reply(&text);
        }
        if text.trim().is_empty() {
            return Err("empty draft text".to_string());
        }

        Ok(ReplyDraft {
            post_id: candidate.id.clone(),
            author: candidate.handle.clone(),
            text,
            source_text: candidate.text.clone(),
            url: candidate.url.clone(),
            status: ApprovalStatus::Pending,
        })
    }

    async fn dispatch(
        &self,
        draft: ReplyDraft,
        seen: &mut SeenStore,
        pending: &mut PendingStore,
        summary: &mut RunSummary,
    ) -> CandidateState {
        if self.config.dry_run {
            info!(
                "[dry-run] would reply to {} (@{}): {}",
                draft.post_id, draft.author, draft.text
            );
            summary.dry_run_logged += 1;
            return CandidateState::DryRunLogged;
        }

        match self.config.mode {
            DispatchMode::Direct => self.post_and_mark(&draft, seen, summary).await,
            DispatchMode::Approval => self.route_for_approval(draft, pending, summary).await,
        }
    }

    async fn route_for_approval(
        &self,
        draft: ReplyDraft,
        pending: &mut PendingStore,
        summary: &mut RunSummary,
    ) -> CandidateState {
        let Some(channel) = self.approval else {
            summary.failed += 1;
            summary
                .errors
                .push("approval mode without a configured channel".to_string());
            return CandidateState::Failed {
                reason: "no approval channel configured".to_string(),
            };
        };

        match channel.submit_drafts(std::slice::from_ref(&draft)).await {
            Ok(ApprovalDecision::Approved { .. }) => {
                // Acceptance is the dispatch event: the id now gates dedup
                // through the pending queue, and a later run publishes it
                pending.push(draft.clone());
                if let Err(error) = pending.flush() {
                    error!("Pending queue flush failed: {}", error);
                    summary.errors.push(format!("pending flush: {error}"));
                }
                info!("Draft for {} approved, queued for posting", draft.post_id);
                summary.pending += 1;
                CandidateState::PendingApproval
            }
            Ok(ApprovalDecision::Rejected) => {
                info!("Draft for {} rejected, discarding", draft.post_id);
                summary.rejected += 1;
                CandidateState::Discarded
            }
            Ok(ApprovalDecision::TimedOut) => {
                // No decision is not a rejection; the candidate stays
                // unhandled and comes back next run
                info!("No decision for {} before timeout", draft.post_id);
                summary.failed += 1;
                CandidateState::Failed {
                    reason: "approval decision timed out".to_string(),
                }
            }
            Err(error) => {
                warn!("Approval submission failed for {}: {}", draft.post_id, error);
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("approval {}: {error}", draft.post_id));
                CandidateState::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Posts the reply, then marks the id handled. The seen-set is only
    /// mutated after the post succeeds, so failures stay retryable.
    async fn post_and_mark(
        &self,
        draft: &ReplyDraft,
        seen: &mut SeenStore,
        summary: &mut RunSummary,
    ) -> CandidateState {
        match self.poster.post_reply(&draft.text, &draft.post_id).await {
            Ok(receipt) => {
                seen.insert(&draft.post_id);
                if let Err(error) = seen.flush() {
                    // The reply is live; losing the flush risks a duplicate
                    // next run, so make the failure loud
                    error!("Seen-set flush failed after posting: {}", error);
                    summary.errors.push(format!("seen flush: {error}"));
                }
                summary.posted += 1;
                CandidateState::Posted {
                    posted_id: receipt.posted_id,
                }
            }
            Err(error) => {
                warn!("Posting failed for {}: {}", draft.post_id, error);
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("post {}: {error}", draft.post_id));
                CandidateState::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Phase 1: publish at most one previously approved draft per run.
    async fn flush_pending(
        &self,
        seen: &mut SeenStore,
        pending: &mut PendingStore,
        summary: &mut RunSummary,
    ) {
        if pending.is_empty() {
            return;
        }
        if self.config.dry_run {
            info!(
                "[dry-run] {} approved draft(s) waiting for a live run",
                pending.len()
            );
            return;
        }

        let Some(entry) = pending.first().cloned() else {
            return;
        };
        info!(
            "Publishing approved draft for @{} ({})",
            entry.draft.author, entry.draft.post_id
        );

        match self
            .poster
            .post_reply(&entry.draft.text, &entry.draft.post_id)
            .await
        {
            Ok(receipt) => {
                seen.insert(&entry.draft.post_id);
                pending.remove(&entry.draft.post_id);
                // Seen-set first: if the pending flush is lost we skip the
                // post next run instead of double-replying
                if let Err(error) = seen.flush() {
                    error!("Seen-set flush failed after posting: {}", error);
                    summary.errors.push(format!("seen flush: {error}"));
                }
                if let Err(error) = pending.flush() {
                    error!("Pending queue flush failed: {}", error);
                    summary.errors.push(format!("pending flush: {error}"));
                }
                summary.posted += 1;
                info!("Approved draft posted as {}", receipt.posted_id);
                if let Some(channel) = self.approval {
                    channel
                        .notify(&format!("Posted reply to @{}", entry.draft.author))
                        .await;
                }
            }
            Err(error) => {
                // Entry stays queued; the next run retries it
                warn!("Posting approved draft failed: {}", error);
                summary.failed += 1;
                summary.errors.push(format!(
                    "pending post {}: {error}",
                    entry.draft.post_id
                ));
                if let Some(channel) = self.approval {
                    channel.notify(&format!("Post failure: {error}")).await;
                }
            }
        }
    }

    fn record_abort(&self, error: CoreError, summary: &mut RunSummary) {
        let cause = match &error {
            CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after }) => {
                AbortCause::RateLimited {
                    retry_after_secs: *retry_after,
                }
            }
            CoreError::PlatformApi(PlatformApiError::AuthenticationFailed { reason }) => {
                AbortCause::AuthenticationFailed {
                    reason: reason.clone(),
                }
            }
            CoreError::PlatformApi(PlatformApiError::Forbidden { resource }) => {
                AbortCause::PermissionDenied {
                    reason: format!("access denied to {resource}"),
                }
            }
            CoreError::Config(e) => AbortCause::Configuration {
                reason: e.to_string(),
            },
            other => AbortCause::Transport {
                message: other.to_string(),
            },
        };

        warn!("Run aborted: {:?}", cause);
        summary.errors.push(error.to_string());
        summary.aborted = Some(cause);
    }
}
