use std::fs;

use ticker_watchdog::classify::{Class, SpamClassifier, SpamDetector};

const SPAM: &str = "\
free bitcoin giveaway click now
win a free prize today click link

claim your crypto giveaway prize
";

const HAM: &str = "\
quarterly earnings beat analyst estimates
revenue guidance raised after strong quarter
margin pressure weighed on earnings
";

fn write_corpora(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let spam = dir.join("spam.txt");
    let ham = dir.join("ham.txt");
    fs::write(&spam, SPAM).unwrap();
    fs::write(&ham, HAM).unwrap();
    (spam, ham)
}

#[test]
fn disjoint_vocabularies_score_their_own_class_higher() {
    let dir = tempfile::tempdir().unwrap();
    let (spam, ham) = write_corpora(dir.path());
    let d = SpamDetector::train_from_files(&spam, &ham).unwrap();

    let s = d.scores("free giveaway prize, click the link");
    assert!(s[Class::Spam.index()] > s[Class::Ham.index()]);
    assert!(d.is_spam("free giveaway prize, click the link"));

    let h = d.scores("earnings and revenue guidance for the quarter");
    assert!(h[Class::Ham.index()] > h[Class::Spam.index()]);
    assert!(!d.is_spam("earnings and revenue guidance for the quarter"));
}

#[test]
fn trained_model_survives_a_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (spam, ham) = write_corpora(dir.path());
    let d = SpamDetector::train_from_files(&spam, &ham).unwrap();

    let model = dir.path().join("spam.json");
    d.classifier().save(&model).unwrap();
    let reloaded = SpamDetector::load(&model).unwrap();
    assert_eq!(
        reloaded.is_spam("win free crypto"),
        d.is_spam("win free crypto")
    );
    assert!(SpamClassifier::load(&model).is_ok());
}

#[test]
fn empty_ham_corpus_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let spam = dir.path().join("spam.txt");
    let ham = dir.path().join("ham.txt");
    fs::write(&spam, SPAM).unwrap();
    fs::write(&ham, "\n   \nthe and of\n").unwrap();

    let err = SpamDetector::train_from_files(&spam, &ham).err().unwrap();
    assert!(format!("{err:#}").contains("Ham"));
}

#[test]
fn missing_corpus_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");
    assert!(SpamDetector::train_from_files(&missing, &missing).is_err());
}
