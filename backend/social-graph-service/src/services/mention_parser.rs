//! Mention Parser Utility
//!
//! Extracts @mentions and #hashtags from post descriptions and comments.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Regex pattern for matching @mentions
/// Matches @username where username can contain alphanumeric characters and underscores.
/// The `@` must not be glued to a preceding word character, so e-mail
/// addresses are not read as mentions.
static MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])@([A-Za-z0-9_]+)").expect("Invalid mention regex")
});

/// Regex pattern for matching #hashtags, same word rules as mentions
static HASHTAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])#([A-Za-z0-9_]+)").expect("Invalid hashtag regex")
});

fn unique_captures(regex: &Regex, content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    regex
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Extract @mentions from content text
///
/// Returns a deduplicated list of usernames mentioned (without the @ symbol),
/// lower-cased, in order of first occurrence.
///
/// # Examples
/// ```
/// use social_graph_service::services::extract_mentions;
///
/// let content = "Hey @alice and @bob, check this out! @alice again";
/// let mentions = extract_mentions(content);
/// assert_eq!(mentions, vec!["alice", "bob"]);
/// ```
pub fn extract_mentions(content: &str) -> Vec<String> {
    unique_captures(&MENTION_REGEX, content)
}

/// Extract #hashtags from content text, deduplicated and lower-cased
/// (without the # symbol)
pub fn extract_hashtags(content: &str) -> Vec<String> {
    unique_captures(&HASHTAG_REGEX, content)
}
