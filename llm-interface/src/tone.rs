use std::collections::HashMap;
use std::str::FromStr;

/// Voice the composer writes in. Either configured explicitly or detected
/// from the source post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Playful,
    Strategic,
    Cosmic,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Playful => "playful",
            Tone::Strategic => "strategic",
            Tone::Cosmic => "cosmic",
        }
    }

    pub fn style_line(self) -> &'static str {
        match self {
            Tone::Playful => {
                "witty, appreciative, lightly sarcastic; add a wink, keep it sharp."
            }
            Tone::Strategic => {
                "concise, insightful, appreciative; one practical lens that hints at real traction."
            }
            Tone::Cosmic => {
                "playful cosmic builder; one gentle orbit/gravity metaphor, never overdone."
            }
        }
    }
}

impl FromStr for Tone {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "playful" => Ok(Tone::Playful),
            "strategic" => Ok(Tone::Strategic),
            "cosmic" => Ok(Tone::Cosmic),
            _ => Err(()),
        }
    }
}

const STRATEGIC_SIGNALS: &[&str] = &[
    "stability", "testing", "edge case", "edge cases", "bug", "latency", "incident", "rollout",
];
const QUESTION_SIGNALS: &[&str] = &["why", "how", "what", "think", "idea"];
const LAUNCH_SIGNALS: &[&str] = &["launch", "partnership", "drop", "soon", "alpha"];
const COSMIC_SIGNALS: &[&str] = &["future", "vision", "universe", "orbit", "space"];
const TROUBLE_SIGNALS: &[&str] = &["scam", "rug", "problem", "fix", "issue"];
const CULTURE_SIGNALS: &[&str] = &["gm", "wagmi", "vibe"];

/// Rough heuristic to pick a tone from the post itself. Bucket order
/// matters: operational and question-shaped posts win over hype words.
pub fn detect_tone(text: &str) -> Tone {
    let lowered = text.to_lowercase();
    let has = |signals: &[&str]| signals.iter().any(|s| lowered.contains(s));

    if has(STRATEGIC_SIGNALS) || has(QUESTION_SIGNALS) {
        return Tone::Strategic;
    }
    if has(LAUNCH_SIGNALS) {
        return Tone::Playful;
    }
    if has(COSMIC_SIGNALS) {
        return Tone::Cosmic;
    }
    if has(TROUBLE_SIGNALS) {
        return Tone::Strategic;
    }
    if has(CULTURE_SIGNALS) {
        return Tone::Playful;
    }
    Tone::Strategic
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "with", "without", "into", "onto", "from", "for", "of",
    "on", "in", "at", "to", "as", "is", "are", "was", "were", "been", "be", "it", "this", "that",
    "those", "these", "we", "you", "they", "i", "our", "your", "their", "not", "just", "only",
];

/// Most frequent content words of the post, ranked by count with first
/// occurrence breaking ties. Used to anchor the generated reply to what the
/// post actually says.
pub fn extract_keywords(text: &str, k: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for raw in text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-')) {
        let word = raw.to_lowercase();
        if word.len() < 3 {
            continue;
        }
        if !word.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order.sort_by_key(|w| std::cmp::Reverse(counts[w]));
    order.truncate(k);
    order
}
