// tests/http_adapters.rs
//
// HttpOracle and HttpContentSource against a local axum stub.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Query, http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use ticker_watchdog::classify::{learn_lines, Class, TextNormalizer, Trainer};
use ticker_watchdog::content::{ContentError, ContentSource, FixtureSource, HttpContentSource, PostId, RawPost};
use ticker_watchdog::oracle::{HttpOracle, OracleError, QuotePeriod, SentimentOracle};
use ticker_watchdog::{Event, EventKind, Pipeline, SpamDetector, SqliteStore};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn sentiment(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let text = body["tweetText"].as_str().unwrap_or_default();
    if text.contains("boom") {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let polarity = if text.contains("moon") { 3.5 } else { -0.25 };
    Ok(Json(json!({ "polarity": polarity })))
}

async fn quotes(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["symbolName"] == "ZZZ" {
        return Err(StatusCode::NOT_FOUND);
    }
    if body["period"] != "7d" {
        return Ok(Json(json!({ "quotes": [] })));
    }
    Ok(Json(json!({
        "quotes": [
            { "timestamp": 300, "price": 3.0 },
            { "timestamp": 100, "price": 1.0 },
            { "timestamp": 200, "price": 2.0 },
        ]
    })))
}

async fn search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let text = format!(
        "{} since {} limit {}",
        q.get("q").map(String::as_str).unwrap_or("-"),
        q.get("since").map(String::as_str).unwrap_or("-"),
        q.get("limit").map(String::as_str).unwrap_or("-"),
    );
    Json(json!([{
        "id": "42",
        "text": text,
        "timestamp": 10,
        "permanent_url": "https://social.example/p/42",
        "likes": 9,
    }]))
}

async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/sentiment", post(sentiment))
        .route("/quotes", post(quotes))
        .route("/search", get(search))
        .route("/broken/search", get(|| async { StatusCode::BAD_GATEWAY }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn oracle_polarity_is_clamped_over_the_wire() {
    let base = spawn_stub().await;
    let oracle = HttpOracle::new(&format!("{base}/"), TIMEOUT).unwrap();

    assert_eq!(oracle.polarity("AAA to the moon").await.unwrap(), 1.0);
    assert_eq!(oracle.polarity("AAA flat day").await.unwrap(), -0.25);
}

#[tokio::test]
async fn oracle_error_status_is_an_error() {
    let base = spawn_stub().await;
    let oracle = HttpOracle::new(&base, TIMEOUT).unwrap();

    let err = oracle.polarity("AAA boom").await.unwrap_err();
    assert!(matches!(err, OracleError::Http(_)));

    let err = oracle
        .quote_history("ZZZ", QuotePeriod::SevenDays)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Http(_)));
}

#[tokio::test]
async fn quote_history_posts_period_and_sorts_oldest_first() {
    let base = spawn_stub().await;
    let oracle = HttpOracle::new(&base, TIMEOUT).unwrap();

    let quotes = oracle
        .quote_history("AAA", QuotePeriod::SevenDays)
        .await
        .unwrap();
    let ts: Vec<i64> = quotes.iter().map(|q| q.timestamp).collect();
    assert_eq!(ts, vec![100, 200, 300]);
    assert_eq!(quotes[0].price, 1.0);

    // The stub only answers the 7d period.
    let other = oracle
        .quote_history("AAA", QuotePeriod::ThirtyDays)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn search_sends_symbol_watermark_and_limit() {
    let base = spawn_stub().await;
    let source = HttpContentSource::new(&base, TIMEOUT).unwrap().with_limit(7);

    let posts = source.fetch("AAA", 1_699_999_000).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "AAA since 1699999000 limit 7");
    assert_eq!(posts[0].id, PostId::Text("42".into()));
    assert_eq!(posts[0].id.parse(), Some(42));
    assert_eq!(posts[0].likes, 9);
    assert_eq!(posts[0].replies, 0);
}

#[tokio::test]
async fn search_error_status_is_an_error() {
    let base = spawn_stub().await;
    let source = HttpContentSource::new(&format!("{base}/broken"), TIMEOUT).unwrap();

    let err = source.fetch("AAA", 0).await.unwrap_err();
    assert!(matches!(err, ContentError::Http(_)));
}

#[tokio::test]
async fn failed_oracle_calls_score_zero_in_a_scrape() {
    const NOW: i64 = 1_700_000_000;
    fn clock() -> i64 {
        NOW
    }

    let base = spawn_stub().await;
    let store = Arc::new(SqliteStore::connect("sqlite::memory:", 1).await.unwrap());
    let post = |id: u64, text: &str| RawPost {
        id: PostId::Num(id),
        text: text.to_string(),
        timestamp: NOW - 10,
        permanent_url: format!("https://social.example/p/{id}"),
        likes: 0,
        replies: 0,
        retweets: 0,
    };
    let content = Arc::new(FixtureSource::new().with_posts(
        "AAA",
        vec![post(1, "AAA to the moon"), post(2, "AAA boom")],
    ));
    let n = TextNormalizer::new();
    let mut t = Trainer::new();
    learn_lines(&mut t, &n, "free giveaway click link", Class::Spam);
    learn_lines(&mut t, &n, "earnings guidance moon", Class::Ham);
    let detector = Arc::new(SpamDetector::new(t.finish().unwrap()));
    let oracle = Arc::new(HttpOracle::new(&base, TIMEOUT).unwrap());
    let pipeline = Pipeline::new(store, content, oracle, detector).with_clock(clock);

    let report = pipeline
        .handle(&Event::new(EventKind::Add, "AAA"))
        .await
        .unwrap();
    let scrape = report.scrape.unwrap();
    assert_eq!(scrape.fetched, 2);
    assert_eq!(scrape.oracle_failures, 1);
    // Clamped 1.0 and the failed call's 0.0.
    assert!((scrape.hourly_sentiment - 0.5).abs() < 1e-9);
}
