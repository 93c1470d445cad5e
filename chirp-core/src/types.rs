use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Follower floor applied client-side; the search API has no operator for it.
pub const MIN_AUTHOR_FOLLOWERS: u64 = 10_000;

/// Hard upper bound on generated reply length, in characters.
pub const MAX_REPLY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct CandidatePost {
    pub id: String,
    pub handle: String,
    pub text: String,
    pub url: String,
    pub verified: bool,
    pub followers: u64,
    pub reply_count: u32,
    pub like_count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub is_reply: bool,
    pub is_retweet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub topics: Vec<String>,
    pub kol_terms: Vec<String>,
    pub min_replies: u32,
    pub min_faves: u32,
    pub window_hours: u64,
    pub exclude_replies: bool,
    pub exclude_retweets: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            kol_terms: vec![
                "KOL".to_string(),
                "key opinion leader".to_string(),
                "influencer".to_string(),
            ],
            min_replies: 10,
            min_faves: 10,
            window_hours: 12,
            exclude_replies: true,
            exclude_retweets: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    AutoApproved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub post_id: String,
    pub author: String,
    pub text: String,
    pub source_text: String,
    pub url: String,
    pub status: ApprovalStatus,
}

/// Explicit per-candidate lifecycle, so retry/resume decisions are auditable
/// instead of inferred from which network calls already happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateState {
    Discovered,
    Drafted,
    DryRunLogged,
    PendingApproval,
    Posted { posted_id: String },
    Discarded,
    SkippedSeen,
    DroppedInvalid { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct PostReceipt {
    pub posted_id: String,
    pub text: String,
}
