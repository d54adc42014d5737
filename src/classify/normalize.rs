// src/classify/normalize.rs
//! Deterministic text preprocessing for the spam classifier.
//!
//! Order: strip links → lowercase → non-alphanumeric runs become spaces →
//! drop stop words → lemmatize irregular forms → Snowball (English) stem.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    include_str!("stopwords_en.txt")
        .lines()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .collect()
});

/// Irregular forms the stemmer cannot fold on its own.
static IRREGULAR: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("went", "go"),
        ("gone", "go"),
        ("better", "good"),
        ("best", "good"),
        ("worse", "bad"),
        ("worst", "bad"),
        ("bought", "buy"),
        ("sold", "sell"),
        ("made", "make"),
        ("took", "take"),
        ("taken", "take"),
        ("got", "get"),
        ("gotten", "get"),
        ("gave", "give"),
        ("given", "give"),
        ("lost", "lose"),
        ("ran", "run"),
        ("paid", "pay"),
        ("said", "say"),
        ("came", "come"),
        ("saw", "see"),
        ("seen", "see"),
        ("knew", "know"),
        ("known", "know"),
        ("thought", "think"),
        ("held", "hold"),
        ("rose", "rise"),
        ("risen", "rise"),
        ("fell", "fall"),
        ("fallen", "fall"),
        ("grew", "grow"),
        ("grown", "grow"),
        ("began", "begin"),
        ("begun", "begin"),
        ("spent", "spend"),
        ("sent", "send"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("people", "person"),
        ("mice", "mouse"),
        ("feet", "foot"),
        ("teeth", "tooth"),
    ]
    .into_iter()
    .collect()
});

pub struct TextNormalizer {
    links: Regex,
    non_alnum: Regex,
    stemmer: Stemmer,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            links: Regex::new(r"(?i)\b(?:https?\S+|www\.\S+)").expect("link regex"),
            non_alnum: Regex::new(r"[^a-z0-9]+").expect("non-alnum regex"),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Turn raw post text into classifier tokens. May return an empty vector.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let without_links = self.links.replace_all(text, " ");
        let lower = without_links.to_lowercase();
        let alnum = self.non_alnum.replace_all(&lower, " ");

        alnum
            .split_whitespace()
            .filter(|w| !is_stop_word(w))
            .map(|w| {
                let lemma = lemmatize(w);
                self.stemmer.stem(lemma).into_owned()
            })
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

fn lemmatize(word: &str) -> &str {
    IRREGULAR.get(word).copied().unwrap_or(word)
}
