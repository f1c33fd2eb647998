use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));

/// Maximum number of characters of document content sent to the provider.
pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Cut `content` to at most [`MAX_PROMPT_CHARS`] characters.
pub fn truncate_content(content: &str) -> &str {
    match content.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((byte_index, _)) => &content[..byte_index],
        None => content,
    }
}

fn first_array(reply: &str) -> Option<&str> {
    JSON_ARRAY.find(reply).map(|m| m.as_str())
}

/// Key points from a model reply.
///
/// Prefers the first JSON string array in the reply. Without one, every
/// non-blank line is a point with list markers stripped. A malformed array
/// turns the whole reply into a single point.
pub fn parse_key_points(reply: &str) -> Vec<String> {
    match first_array(reply) {
        Some(array) => match serde_json::from_str::<Vec<String>>(array) {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!("Key point reply held an unparseable array: {e}");
                vec![reply.trim().to_string()]
            }
        },
        None => reply
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    }
}

/// Tags from a model reply.
///
/// Prefers the first JSON string array; otherwise the reply is split on
/// commas and newlines. A malformed array yields no tags.
pub fn parse_tags(reply: &str) -> Vec<String> {
    let tags: Vec<String> = match first_array(reply) {
        Some(array) => match serde_json::from_str::<Vec<String>>(array) {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!("Tag reply held an unparseable array: {e}");
                Vec::new()
            }
        },
        None => reply.split([',', '\n']).map(String::from).collect(),
    };

    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// A provider's verdict on whether a document answers a search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Relevance {
    #[serde(default)]
    pub relevant: bool,
    #[serde(default)]
    pub snippet: String,
}

/// Parse a `{"relevant": .., "snippet": ..}` reply.
///
/// Replies that are not JSON count as relevant when they mention "yes" or
/// "relevant", with the opening of `excerpt` as the snippet.
pub fn parse_relevance(reply: &str, excerpt: &str) -> Relevance {
    match serde_json::from_str::<Relevance>(reply.trim()) {
        Ok(relevance) => relevance,
        Err(_) => {
            let lower = reply.to_lowercase();
            if lower.contains("yes") || lower.contains("relevant") {
                Relevance {
                    relevant: true,
                    snippet: format!("{}...", take_chars(excerpt, 0, 200)),
                }
            } else {
                Relevance::default()
            }
        }
    }
}

/// Excerpt of `content` around the first query term longer than three
/// characters, or its opening when no term occurs.
pub fn text_snippet(content: &str, query: &str) -> String {
    let hit = query
        .split_whitespace()
        .filter(|term| term.chars().count() > 3)
        .find_map(|term| find_ignore_case(content, term).map(|at| (at, term.chars().count())));

    match hit {
        Some((at, len)) => format!(
            "{}...",
            take_chars(content, at.saturating_sub(100), at + len + 100)
        ),
        None => format!("{}...", take_chars(content, 0, 200)),
    }
}

/// Characters `start..end` of `s`, clamped to its length.
fn take_chars(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Character index of the first case-insensitive occurrence of `needle`.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    let hay: Vec<char> = haystack.chars().collect();
    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - needle.len()).find(|&start| {
        hay[start..start + needle.len()]
            .iter()
            .flat_map(|c| c.to_lowercase())
            .eq(needle.iter().copied())
    })
}

/// Remove a leading `1.`, `-` or `*` marker.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['-', '*']) {
        return rest.trim_start();
    }

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return rest.trim_start();
        }
    }
    line
}
