// src/bin/train_classifier.rs
//! Offline spam model training.
//!
//! Usage: `train-classifier <spam.txt> <ham.txt> <model.json>`
//! Each non-empty line of the corpora is one document.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use ticker_watchdog::classify::{Class, SpamDetector};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [spam, ham, out] = args.as_slice() else {
        bail!("usage: train-classifier <spam.txt> <ham.txt> <model.json>");
    };
    let (spam, ham, out) = (PathBuf::from(spam), PathBuf::from(ham), PathBuf::from(out));

    let detector = SpamDetector::train_from_files(&spam, &ham)?;
    detector
        .classifier()
        .save(&out)
        .with_context(|| format!("writing model to {}", out.display()))?;

    let model = detector.classifier();
    tracing::info!(
        out = %out.display(),
        spam_terms = model.vocabulary_len(Class::Spam),
        ham_terms = model.vocabulary_len(Class::Ham),
        "spam model written"
    );
    Ok(())
}
