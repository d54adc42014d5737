// src/classify/bayes.rs
//! Two-class naive Bayes over TF-IDF weighted vocabularies.
//!
//! Training collects one term-count map per labeled line. `Trainer::finish`
//! computes smoothed idf over all documents and folds each document's
//! normalized term frequencies into a per-class weight vector. The result is
//! immutable and safe to share behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub const MODEL_VERSION: u32 = 1;

/// Upper bound on the probability of a term the class never saw.
const UNSEEN_PROB: f64 = 1e-11;

/// Extra gap kept between the unseen floor and the rarest seen term.
const UNSEEN_MARGIN: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Ham,
    Spam,
}

impl Class {
    pub const ALL: [Class; 2] = [Class::Ham, Class::Spam];

    pub fn index(self) -> usize {
        match self {
            Class::Ham => 0,
            Class::Spam => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("cannot vectorize model: no training documents for class {0:?}")]
    EmptyClass(Class),
    #[error("model file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("model file format: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unsupported model version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("model file is missing class {0:?}")]
    MissingClass(Class),
}

/// Accumulates labeled documents as raw term counts.
#[derive(Debug, Default)]
pub struct Trainer {
    docs: [Vec<HashMap<String, u32>>; 2],
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document. Empty token sequences carry no evidence and are skipped.
    pub fn learn<S: AsRef<str>>(&mut self, tokens: &[S], class: Class) {
        if tokens.is_empty() {
            return;
        }
        let mut counts: HashMap<String, u32> = HashMap::new();
        for t in tokens {
            *counts.entry(t.as_ref().to_string()).or_insert(0) += 1;
        }
        self.docs[class.index()].push(counts);
    }

    pub fn documents(&self, class: Class) -> usize {
        self.docs[class.index()].len()
    }

    /// Convert term frequencies to TF-IDF weights and freeze the model.
    pub fn finish(self) -> Result<SpamClassifier, ClassifierError> {
        for class in Class::ALL {
            if self.docs[class.index()].is_empty() {
                return Err(ClassifierError::EmptyClass(class));
            }
        }

        let n_docs = self.docs.iter().map(Vec::len).sum::<usize>() as f64;
        let mut doc_freq: HashMap<&str, u32> = HashMap::new();
        for doc in self.docs.iter().flatten() {
            for term in doc.keys() {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let idf: HashMap<&str, f64> = doc_freq
            .iter()
            .map(|(term, df)| (*term, ((1.0 + n_docs) / (1.0 + *df as f64)).ln() + 1.0))
            .collect();

        let mut classes: [ClassWeights; 2] = Default::default();
        for class in Class::ALL {
            let docs = &self.docs[class.index()];
            let out = &mut classes[class.index()];
            out.documents = docs.len() as u32;
            for doc in docs {
                let len: u32 = doc.values().sum();
                for (term, count) in doc {
                    let tf = *count as f64 / len as f64;
                    let w = tf * idf[term.as_str()];
                    *out.weights.entry(term.clone()).or_insert(0.0) += w;
                }
            }
            out.total = out.weights.values().sum();
        }

        Ok(SpamClassifier::from_classes(classes))
    }
}

#[derive(Debug, Clone, Default)]
struct ClassWeights {
    documents: u32,
    weights: HashMap<String, f64>,
    total: f64,
}

impl ClassWeights {
    fn log_likelihood(&self, term: &str, unseen_ln: f64) -> f64 {
        match self.weights.get(term) {
            Some(w) if *w > 0.0 && self.total > 0.0 => (w / self.total).ln(),
            _ => unseen_ln,
        }
    }

    fn min_seen_prob(&self) -> f64 {
        self.weights
            .values()
            .filter(|w| **w > 0.0)
            .map(|w| w / self.total)
            .fold(1.0, f64::min)
    }
}

/// Trained, read-only classifier.
#[derive(Debug, Clone)]
pub struct SpamClassifier {
    classes: [ClassWeights; 2],
    /// `ln` of the shared probability for unseen terms.
    unseen_ln: f64,
}

impl SpamClassifier {
    /// The unseen floor stays below every seen term probability scaled by
    /// the prior ratio, so a term known to one class always outweighs the
    /// other class's prior, however unbalanced the corpus.
    fn from_classes(classes: [ClassWeights; 2]) -> Self {
        let [ham, spam] = &classes;
        let (lo, hi) = if ham.documents < spam.documents {
            (ham.documents, spam.documents)
        } else {
            (spam.documents, ham.documents)
        };
        let prior_ratio = lo as f64 / hi.max(1) as f64;
        let min_seen = ham.min_seen_prob().min(spam.min_seen_prob());
        let floor = UNSEEN_PROB
            .min(min_seen * prior_ratio * UNSEEN_MARGIN)
            .max(f64::MIN_POSITIVE);
        Self {
            classes,
            unseen_ln: floor.ln(),
        }
    }

    /// Posterior probability per class, indexed by `Class::index`. Sums to 1.
    pub fn scores<S: AsRef<str>>(&self, tokens: &[S]) -> [f64; 2] {
        let n_docs: f64 = self.classes.iter().map(|c| c.documents as f64).sum();
        let mut log = [0.0f64; 2];
        for class in Class::ALL {
            let cw = &self.classes[class.index()];
            let prior = (cw.documents as f64 / n_docs).ln();
            let evidence: f64 = tokens
                .iter()
                .map(|t| cw.log_likelihood(t.as_ref(), self.unseen_ln))
                .sum();
            log[class.index()] = prior + evidence;
        }

        let max = log[0].max(log[1]);
        let ham = (log[0] - max).exp();
        let spam = (log[1] - max).exp();
        let z = ham + spam;
        [ham / z, spam / z]
    }

    /// Ham only when its score strictly exceeds spam; ties go to spam.
    pub fn classify<S: AsRef<str>>(&self, tokens: &[S]) -> Class {
        let s = self.scores(tokens);
        if s[Class::Ham.index()] > s[Class::Spam.index()] {
            Class::Ham
        } else {
            Class::Spam
        }
    }

    pub fn vocabulary_len(&self, class: Class) -> usize {
        self.classes[class.index()].weights.len()
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let file = ModelFile {
            version: MODEL_VERSION,
            classes: Class::ALL
                .iter()
                .map(|class| {
                    let cw = &self.classes[class.index()];
                    ClassEntry {
                        class: *class,
                        documents: cw.documents,
                        weights: cw.weights.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                    }
                })
                .collect(),
        };
        let json = serde_json::to_vec(&file)?;

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = path.with_extension("tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = fs::read(path)?;
        let file: ModelFile = serde_json::from_slice(&raw)?;
        if file.version != MODEL_VERSION {
            return Err(ClassifierError::Version {
                found: file.version,
                expected: MODEL_VERSION,
            });
        }

        let mut classes: [Option<ClassWeights>; 2] = [None, None];
        for entry in file.classes {
            let weights: HashMap<String, f64> = entry.weights.into_iter().collect();
            let total = weights.values().sum();
            classes[entry.class.index()] = Some(ClassWeights {
                documents: entry.documents,
                weights,
                total,
            });
        }
        let [ham, spam] = classes;
        let ham = ham.ok_or(ClassifierError::MissingClass(Class::Ham))?;
        let spam = spam.ok_or(ClassifierError::MissingClass(Class::Spam))?;
        for (class, cw) in [(Class::Ham, &ham), (Class::Spam, &spam)] {
            if cw.documents == 0 {
                return Err(ClassifierError::EmptyClass(class));
            }
        }
        Ok(Self::from_classes([ham, spam]))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    version: u32,
    classes: Vec<ClassEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassEntry {
    class: Class,
    documents: u32,
    weights: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn trained() -> SpamClassifier {
        let mut t = Trainer::new();
        t.learn(&toks("free prize click win"), Class::Spam);
        t.learn(&toks("win free crypto giveaway"), Class::Spam);
        t.learn(&toks("earnings beat guidance raised"), Class::Ham);
        t.learn(&toks("revenue guidance margin earnings"), Class::Ham);
        t.finish().unwrap()
    }

    #[test]
    fn scores_are_probabilities() {
        let c = trained();
        let s = c.scores(&toks("earnings prize"));
        assert!((s[0] + s[1] - 1.0).abs() < 1e-9);
        assert!(s.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn labels_follow_vocabulary() {
        let c = trained();
        assert_eq!(c.classify(&toks("free giveaway click")), Class::Spam);
        assert_eq!(c.classify(&toks("guidance margin")), Class::Ham);
    }

    #[test]
    fn tie_goes_to_spam() {
        let c = trained();
        // Balanced priors and no known terms give equal scores.
        let s = c.scores(&toks("unrelated words"));
        assert_eq!(s[0], s[1]);
        assert_eq!(c.classify(&toks("unrelated words")), Class::Spam);
        assert_eq!(c.classify::<String>(&[]), Class::Spam);
    }

    #[test]
    fn finish_fails_without_both_classes() {
        let mut t = Trainer::new();
        t.learn(&toks("only ham here"), Class::Ham);
        t.learn::<String>(&[], Class::Spam);
        assert!(matches!(
            t.finish(),
            Err(ClassifierError::EmptyClass(Class::Spam))
        ));
    }

    #[test]
    fn save_and_load_preserve_scores() {
        let c = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/spam.json");
        c.save(&path).unwrap();

        let loaded = SpamClassifier::load(&path).unwrap();
        let probe = toks("free earnings win");
        let (a, b) = (c.scores(&probe), loaded.scores(&probe));
        assert!((a[0] - b[0]).abs() < 1e-12);
        assert_eq!(loaded.vocabulary_len(Class::Spam), c.vocabulary_len(Class::Spam));
    }

    #[test]
    fn own_vocabulary_beats_extreme_prior() {
        let mut t = Trainer::new();
        for _ in 0..2_000 {
            t.learn(&toks("earnings guidance revenue margin"), Class::Ham);
        }
        t.learn(&toks("giveaway"), Class::Spam);
        let c = t.finish().unwrap();

        assert_eq!(c.classify(&toks("giveaway")), Class::Spam);
        assert_eq!(c.classify(&toks("margin")), Class::Ham);
        let s = c.scores(&toks("giveaway giveaway"));
        assert!(s[Class::Spam.index()] > s[Class::Ham.index()]);
    }

    #[test]
    fn rare_term_outweighs_prior_in_loaded_model() {
        // One spam document whose only distinctive term is very rare in it,
        // against a million ham documents. Spam only wins once the unseen
        // floor drops well below 1e-11.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(
            &path,
            r#"{"version":1,"classes":[
                {"class":"ham","documents":1000000,"weights":{"earnings":1.0}},
                {"class":"spam","documents":1,"weights":{"giveaway":1e-9,"bulk":1000.0}}
            ]}"#,
        )
        .unwrap();
        let c = SpamClassifier::load(&path).unwrap();

        let s = c.scores(&toks("giveaway"));
        assert!(s[Class::Spam.index()] > s[Class::Ham.index()]);
        assert_eq!(c.classify(&toks("earnings")), Class::Ham);
        // Terms unseen by both classes fall back to the prior.
        let u = c.scores(&toks("unrelated"));
        assert!(u[Class::Ham.index()] > u[Class::Spam.index()]);
    }

    #[test]
    fn load_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, r#"{"version":99,"classes":[]}"#).unwrap();
        assert!(matches!(
            SpamClassifier::load(&path),
            Err(ClassifierError::Version { found: 99, .. })
        ));
    }
}
