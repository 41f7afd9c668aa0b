use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use placesearch_core::persist::{save_snapshot, IndexPaths};
use placesearch_core::tokenizer::{LexiconNormalizer, Normalizer};
use placesearch_core::{CorpusIndex, SourceDoc};
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn write_index(dir: &Path, reviews: &[(&str, &str, f64, &str)]) {
    let n = LexiconNormalizer::default();
    let index = CorpusIndex::build(reviews.iter().map(|(place, location, rating, text)| SourceDoc {
        place: place.to_string(),
        location: location.to_string(),
        rating: *rating,
        tokens: n.normalize(text),
    }))
    .unwrap();
    save_snapshot(&IndexPaths::new(dir), &index, "2024-01-01T00:00:00Z").unwrap();
}

fn build_tiny_index(dir: &Path) {
    write_index(
        dir,
        &[
            ("Ranca Upas", "Bandung, Jawa Barat", 5.0, "kemah sejuk sejuk"),
            ("Gunung Pancar", "Bogor, Jawa Barat", 4.0, "kemah kota"),
            ("Ranca Upas", "Bandung, Jawa Barat", 3.0, "sejuk"),
            ("Pantai Sawarna", "Lebak, Banten", 4.5, "pantai"),
        ],
    );
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn app_for(dir: &Path) -> Router {
    server::build_app(dir.to_string_lossy().to_string(), None).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = get(app_for(dir.path()), "/search?q=sejuk&k=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"].as_u64().unwrap(), 0);
    assert_eq!(arr[1]["doc_id"].as_u64().unwrap(), 2);
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn k_limits_ranked_results_but_not_total_hits() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (_, json) = get(app_for(dir.path()), "/search?q=sejuk&k=1&scheme=sublinear").await;
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn boolean_search_returns_unscored_matches() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = get(app_for(dir.path()), "/search?q=kemah%20NOT%20kota&model=boolean").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["doc_id"], 0);
    assert!(arr[0]["score"].is_null());

    let (status, json) = get(app_for(dir.path()), "/search?q=kemah%20AND&model=boolean").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn places_are_deduplicated() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = get(app_for(dir.path()), "/places?q=sejuk").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "rank");
    let places = json["places"].as_array().unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0]["name"], "Ranca Upas");
    assert_eq!(places[0]["avg_rating"], 4.0);
    assert!(places[0]["photo_url"].as_str().unwrap().starts_with("https://placehold.co/"));
}

#[tokio::test]
async fn boolean_places_are_deduplicated() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = get(app_for(dir.path()), "/places?q=kemah%20OR%20sejuk&model=boolean").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["mode"].is_null());
    assert_eq!(json["total_hits"], 2);
    let names: Vec<&str> = json["places"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Ranca Upas", "Gunung Pancar"]);
}

#[tokio::test]
async fn doc_lookup_and_miss() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = get(app_for(dir.path()), "/doc/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["place"], "Pantai Sawarna");
    assert_eq!(json["doc_id"], 3);

    let (status, json) = get(app_for(dir.path()), "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not found");
}

#[tokio::test]
async fn missing_snapshot_fails_startup() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path().to_string_lossy().to_string(), None).is_err());
}

#[tokio::test]
async fn reload_swaps_snapshot() {
    std::env::set_var("ADMIN_TOKEN", "sekret");
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app_for(dir.path());

    let unauthorized = Request::post("/admin/reload").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    write_index(dir.path(), &[("Danau Situ Gunung", "Sukabumi", 4.8, "danau kabut")]);
    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "sekret").body(Body::empty()).unwrap();
    let (status, body) = call(app.clone(), reload).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["num_docs"], 1);

    let (_, json) = get(app.clone(), "/search?q=danau").await;
    assert_eq!(json["results"][0]["place"], "Danau Situ Gunung");

    // a broken snapshot is rejected and the current one keeps serving
    std::fs::remove_file(dir.path().join("idf.bin")).unwrap();
    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "sekret").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), reload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (_, json) = get(app, "/search?q=danau").await;
    assert_eq!(json["total_hits"], 1);
}
