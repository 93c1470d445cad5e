use chirp_core::{ConfigError, SearchFilter};

/// Builds the recent-search query string from a filter.
///
/// Shape: `(topic OR topic) (kol OR "multi word kol") min_replies:N
/// min_faves:N -is:reply -is:retweet`. The topic group is matched AND-wise
/// against the KOL group by the search API. Output is deterministic: the same
/// filter always yields the same bytes (configured order is preserved).
///
/// A filter with no usable topics is a configuration error, never a silent
/// unfiltered query.
pub fn build_query(filter: &SearchFilter) -> Result<String, ConfigError> {
    let topics: Vec<&str> = filter
        .topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if topics.is_empty() {
        return Err(ConfigError::ValidationFailed {
            reason: "search filter has no topics".to_string(),
        });
    }

    let mut query = format!("({})", topics.join(" OR "));

    let kol_terms: Vec<String> = filter
        .kol_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(quote_term)
        .collect();

    if !kol_terms.is_empty() {
        query.push_str(&format!(" ({})", kol_terms.join(" OR ")));
    }

    query.push_str(&format!(
        " min_replies:{} min_faves:{}",
        filter.min_replies, filter.min_faves
    ));

    if filter.exclude_replies {
        query.push_str(" -is:reply");
    }
    if filter.exclude_retweets {
        query.push_str(" -is:retweet");
    }

    Ok(query)
}

/// Multi-word terms need quoting to match as a phrase; single tokens
/// (keywords, hashtags, cashtags like `$POL`) pass through verbatim.
fn quote_term(term: &str) -> String {
    if term.contains(char::is_whitespace) {
        format!("\"{term}\"")
    } else {
        term.to_string()
    }
}
