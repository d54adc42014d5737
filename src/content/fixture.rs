// src/content/fixture.rs
use super::{ContentError, ContentSource, RawPost};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process source serving canned posts per symbol. Used by tests and
/// offline runs.
#[derive(Default)]
pub struct FixtureSource {
    posts: Mutex<HashMap<String, Vec<RawPost>>>,
    fail: bool,
    pub calls: Mutex<Vec<(String, i64)>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every fetch fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_posts(self, symbol: &str, posts: Vec<RawPost>) -> Self {
        self.set_posts(symbol, posts);
        self
    }

    pub fn set_posts(&self, symbol: &str, posts: Vec<RawPost>) {
        if let Ok(mut map) = self.posts.lock() {
            map.insert(symbol.to_string(), posts);
        }
    }
}

#[async_trait::async_trait]
impl ContentSource for FixtureSource {
    async fn fetch(&self, symbol: &str, since: i64) -> Result<Vec<RawPost>, ContentError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((symbol.to_string(), since));
        }
        if self.fail {
            return Err(ContentError::Unavailable("fixture configured to fail".into()));
        }
        let map = self
            .posts
            .lock()
            .map_err(|_| ContentError::Unavailable("fixture lock poisoned".into()))?;
        Ok(map.get(symbol).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
