// src/classify/mod.rs
//! Spam detection: text normalization feeding a TF-IDF naive Bayes model.

pub mod bayes;
pub mod normalize;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub use bayes::{Class, ClassifierError, SpamClassifier, Trainer};
pub use normalize::TextNormalizer;

/// Normalizer + trained model. Built once at startup and shared read-only.
pub struct SpamDetector {
    normalizer: TextNormalizer,
    classifier: SpamClassifier,
}

impl SpamDetector {
    pub fn new(classifier: SpamClassifier) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            classifier,
        }
    }

    pub fn load(model_path: &Path) -> Result<Self> {
        let classifier = SpamClassifier::load(model_path)
            .with_context(|| format!("loading spam model {}", model_path.display()))?;
        Ok(Self::new(classifier))
    }

    /// Train from newline-delimited corpora, one document per non-empty line.
    pub fn train_from_files(spam_path: &Path, ham_path: &Path) -> Result<Self> {
        let normalizer = TextNormalizer::new();
        let mut trainer = Trainer::new();
        for (path, class) in [(spam_path, Class::Spam), (ham_path, Class::Ham)] {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {class:?} corpus {}", path.display()))?;
            learn_lines(&mut trainer, &normalizer, &text, class);
        }
        tracing::info!(
            target: "classify",
            spam_docs = trainer.documents(Class::Spam),
            ham_docs = trainer.documents(Class::Ham),
            "training spam model"
        );
        let classifier = trainer.finish()?;
        Ok(Self {
            normalizer,
            classifier,
        })
    }

    pub fn classifier(&self) -> &SpamClassifier {
        &self.classifier
    }

    pub fn scores(&self, text: &str) -> [f64; 2] {
        let tokens = self.normalizer.tokens(text);
        self.classifier.scores(&tokens)
    }

    pub fn is_spam(&self, text: &str) -> bool {
        let tokens = self.normalizer.tokens(text);
        self.classifier.classify(&tokens) == Class::Spam
    }
}

pub fn learn_lines(trainer: &mut Trainer, normalizer: &TextNormalizer, text: &str, class: Class) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        trainer.learn(&normalizer.tokens(line), class);
    }
}
