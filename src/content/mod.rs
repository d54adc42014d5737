// src/content/mod.rs
//! Social-media content source.
//!
//! Sources return raw posts; `prepare` turns them into unscored statements:
//! sanitize the text, keep only posts that still mention the symbol and are
//! not older than the watermark.

pub mod fixture;
pub mod http;

use crate::types::Statement;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fixture::FixtureSource;
pub use http::HttpContentSource;

/// Upper bound on posts requested per fetch.
pub const DEFAULT_FETCH_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

/// Post ids arrive either as JSON numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Num(u64),
    Text(String),
}

impl PostId {
    pub fn parse(&self) -> Option<u64> {
        match self {
            PostId::Num(n) => Some(*n),
            PostId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: PostId,
    pub text: String,
    pub timestamp: i64,
    pub permanent_url: String,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub replies: i64,
    #[serde(default)]
    pub retweets: i64,
}

#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Posts mentioning `symbol` published at or after `since` (unix seconds).
    async fn fetch(&self, symbol: &str, since: i64) -> Result<Vec<RawPost>, ContentError>;
    fn name(&self) -> &'static str;
}

static NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]").unwrap());

/// Shortcodes of the distinct emoji in `text`, in order of first appearance.
fn emoji_slugs(text: &str) -> Vec<&'static str> {
    let mut slugs = Vec::new();
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c.is_ascii() {
            rest = &rest[c.len_utf8()..];
            continue;
        }
        // Longest known sequence starting here; ZWJ families stay under 10 scalars.
        let ends: Vec<usize> = rest
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take(10)
            .collect();
        match ends
            .iter()
            .rev()
            .find_map(|&end| emojis::get(&rest[..end]).map(|e| (end, e)))
        {
            Some((end, emoji)) => {
                if let Some(code) = emoji.shortcode() {
                    if !slugs.contains(&code) {
                        slugs.push(code);
                    }
                }
                rest = &rest[end..];
            }
            None => rest = &rest[c.len_utf8()..],
        }
    }
    slugs
}

/// Strip non-ASCII characters, append a shortcode for each distinct emoji
/// (`🚀` → `rocket`), then make the text safe for naive downstream quoting:
/// `"` becomes `'`, `;` becomes `semi-colon`.
///
/// A post with nothing left after stripping sanitizes to the empty string.
pub fn sanitize_post(text: &str) -> String {
    let mut s = NON_ASCII.replace_all(text, "").into_owned();
    if s.is_empty() {
        return s;
    }
    for slug in emoji_slugs(text) {
        s.push(' ');
        s.push_str(slug);
        s.push(' ');
    }
    s.replace('"', "'").replace(';', "semi-colon")
}

/// Sanitize and filter raw posts into statements with zero polarity.
pub fn prepare(symbol: &str, since: i64, posts: Vec<RawPost>) -> Vec<Statement> {
    let mut out = Vec::with_capacity(posts.len());
    for post in posts {
        let text = sanitize_post(&post.text);
        if !text.contains(symbol) || post.timestamp < since {
            continue;
        }
        let Some(external_id) = post.id.parse() else {
            tracing::warn!(target: "pipeline", symbol, id = ?post.id, "skipping post with non-numeric id");
            continue;
        };
        out.push(Statement {
            expression: text,
            timestamp: post.timestamp,
            polarity: 0.0,
            permanent_url: post.permanent_url,
            external_id,
            likes: post.likes,
            replies: post.replies,
            retweets: post.retweets,
            spam: false,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, text: &str, ts: i64) -> RawPost {
        RawPost {
            id: PostId::Text(id.into()),
            text: text.into(),
            timestamp: ts,
            permanent_url: format!("https://social.example/p/{id}"),
            likes: 0,
            replies: 0,
            retweets: 0,
        }
    }

    #[test]
    fn sanitize_strips_emoji_and_rewrites_punctuation() {
        assert_eq!(
            sanitize_post("AAA \"to the moon\" 🚀; buy"),
            "AAA 'to the moon' semi-colon buy rocket "
        );
        assert_eq!(sanitize_post("🚀🚀"), "");
        assert_eq!(sanitize_post("plain; text"), "plain semi-colon text");
    }

    #[test]
    fn emoji_become_shortcodes_once_each() {
        assert_eq!(sanitize_post("AAA 🚀🚀 🌙"), "AAA   rocket  crescent_moon ");
        assert_eq!(emoji_slugs("é café 🚀"), vec!["rocket"]);
        assert!(emoji_slugs("no emoji here").is_empty());
    }

    #[test]
    fn prepare_filters_relevance_and_watermark() {
        let posts = vec![
            post("1", "AAA beats estimates", 100),
            post("2", "nothing relevant", 100),
            post("3", "AAA old news", 10),
            post("x", "AAA bad id", 100),
            post("4", "A\u{00c9}AA glued after strip", 100),
        ];
        let out = prepare("AAA", 50, posts);
        let ids: Vec<u64> = out.iter().map(|s| s.external_id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(out.iter().all(|s| s.polarity == 0.0 && !s.spam));
    }

    #[test]
    fn post_ids_accept_numbers_and_strings() {
        let raw = r#"[{"id":7,"text":"t","timestamp":1,"permanent_url":"u"},
                      {"id":"8","text":"t","timestamp":1,"permanent_url":"v","likes":3}]"#;
        let posts: Vec<RawPost> = serde_json::from_str(raw).unwrap();
        assert_eq!(posts[0].id.parse(), Some(7));
        assert_eq!(posts[1].id.parse(), Some(8));
        assert_eq!(posts[1].likes, 3);
    }
}
