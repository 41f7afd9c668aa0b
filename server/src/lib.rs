use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use placesearch_core::assemble::PlaceHit;
use placesearch_core::engine::{Engine, Model, Retrieval, RetrievalRequest};
use placesearch_core::persist::{load_snapshot, IndexPaths};
use placesearch_core::query::RetrievalMode;
use placesearch_core::tokenizer::LexiconNormalizer;
use placesearch_core::vsm::WeightingScheme;
use placesearch_core::DocId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_model")]
    pub model: Model,
    #[serde(default)]
    pub scheme: WeightingScheme,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_model() -> Model { Model::Vsm }
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct PlaceParams {
    pub q: String,
    #[serde(default = "default_model")]
    pub model: Model,
    #[serde(default)]
    pub scheme: WeightingScheme,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub model: Model,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    /// Absent for Boolean matches
    pub score: Option<f64>,
    pub place: String,
    pub location: String,
}

#[derive(Serialize)]
pub struct PlaceResponse {
    pub query: String,
    pub model: Model,
    /// Absent for Boolean queries
    pub mode: Option<RetrievalMode>,
    pub region: Option<String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub places: Vec<PlaceHit>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub engine: Arc<Engine>,
    pub admin_token: Option<String>,
}

pub fn build_app(index_dir: String, lexicon: Option<String>) -> Result<Router> {
    // the snapshot must load completely before anything is served
    let corpus = load_snapshot(&IndexPaths::new(&index_dir)).with_context(|| format!("loading index {index_dir}"))?;
    let normalizer = match &lexicon {
        Some(path) => LexiconNormalizer::from_path(path).with_context(|| format!("loading lexicon {path}"))?,
        None => LexiconNormalizer::default(),
    };
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState {
        index_paths_root: PathBuf::from(&index_dir),
        engine: Arc::new(Engine::with_lexicon(corpus, normalizer)),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/places", get(places_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let request =
        RetrievalRequest { query: params.q.clone(), model: params.model, scheme: Some(params.scheme), top_k: None };
    let index = state.engine.index();

    let retrieval = state.engine.retrieve(&request);
    let total_hits = retrieval.len();
    let scored: Vec<(DocId, Option<f64>)> = match retrieval {
        Retrieval::Boolean(ids) => ids.into_iter().map(|id| (id, None)).collect(),
        Retrieval::Ranked(docs) => {
            let k = params.k.max(1).min(MAX_K);
            docs.into_iter().take(k).map(|d| (d.doc_id, Some(d.score))).collect()
        }
    };

    let results: Vec<SearchHit> = scored
        .into_iter()
        .filter_map(|(doc_id, score)| {
            index.doc(doc_id).map(|meta| SearchHit {
                doc_id,
                score,
                place: meta.place.clone(),
                location: meta.location.clone(),
            })
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, model = %params.model, total_hits, "search");
    Json(SearchResponse { query: params.q, model: params.model, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn places_handler(State(state): State<AppState>, Query(params): Query<PlaceParams>) -> Json<PlaceResponse> {
    let start = std::time::Instant::now();
    let k = params.k.max(1).min(MAX_K);
    let found = state.engine.search_places(&params.q, params.model, params.scheme, Some(k));
    let elapsed = start.elapsed();
    let (mode, region) = match found.analyzed {
        Some(analyzed) => (Some(analyzed.mode), analyzed.region),
        None => (None, None),
    };
    Json(PlaceResponse {
        query: params.q,
        model: params.model,
        mode,
        region,
        took_s: elapsed.as_secs_f64(),
        total_hits: found.total_hits,
        places: found.places,
    })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let index = state.engine.index();
    match index.doc(doc_id) {
        Some(meta) => {
            let mut obj = serde_json::json!(meta);
            obj["doc_id"] = serde_json::json!(doc_id);
            Ok(Json(obj))
        }
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

/// Reload the snapshot from disk and swap it in. A failed load keeps serving
/// the current snapshot.
async fn reload_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let root = state.index_paths_root.clone();
    let loaded = tokio::task::spawn_blocking(move || load_snapshot(&IndexPaths::new(root)))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("reload task failed: {e}")))?;
    match loaded {
        Ok(corpus) => {
            let (num_docs, num_terms) = (corpus.num_docs(), corpus.num_terms());
            state.engine.swap(corpus);
            Ok(Json(serde_json::json!({ "num_docs": num_docs, "num_terms": num_terms })))
        }
        Err(e) => {
            tracing::warn!(error = %e, "snapshot reload failed, keeping current index");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e}")))
        }
    }
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
