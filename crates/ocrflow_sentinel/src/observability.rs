//! Observability HTTP server (spec.md §4.9): `GET /metrics`, `GET /jobs`,
//! `GET /jobs/{jobKey}`, `GET /config`, `POST /config`, plus an ambient
//! `GET /healthz`. Runs on its own tokio runtime alongside the scheduler's
//! dedicated OS thread (spec.md §5); every handler only ever touches the
//! [`Shared`] mutex for a copy or a whitelisted patch, never while doing I/O.

use crate::shared::Shared;
use crate::store::JobStore;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use ocrflow_ids::JobKey;
use ocrflow_protocol::{LoadOutcome, RuntimeConfig};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    shared: Arc<Shared>,
    store: Arc<JobStore>,
}

pub fn router(shared: Arc<Shared>, store: Arc<JobStore>) -> Router {
    let state = AppState { shared, store };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_key", get(job_detail))
        .route("/config", get(get_config).post(patch_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    if state.shared.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.shared.metrics.snapshot())
}

async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.shared.job_rows())
}

async fn job_detail(State(state): State<AppState>, AxumPath(job_key): AxumPath<String>) -> Response {
    let Ok(job_key) = JobKey::parse(&job_key) else {
        return (StatusCode::BAD_REQUEST, "malformed jobKey").into_response();
    };
    match state.store.read_state(&job_key) {
        LoadOutcome::Loaded(job) => Json(job).into_response(),
        LoadOutcome::Absent => (StatusCode::NOT_FOUND, "job not found").into_response(),
        LoadOutcome::Corrupt(reason) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("state.json corrupt: {reason}")).into_response()
        }
    }
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.shared.runtime_config())
}

/// Every field is optional in the request body; only the keys present are
/// patched (spec.md §4.9's whitelist), everything else is left untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigPatchRequest {
    prep_concurrency: Option<usize>,
    ocr_concurrency: Option<usize>,
    job_timeout_s: Option<u64>,
    default_ocr_lang: Option<String>,
}

/// Response shape is `{"applied": {...}}`, where `applied` holds only the
/// keys actually present in the request body — never the full config.
async fn patch_config(State(state): State<AppState>, Json(body): Json<ConfigPatchRequest>) -> impl IntoResponse {
    let mut applied = serde_json::Map::new();
    if let Some(v) = body.prep_concurrency {
        applied.insert("prepConcurrency".into(), serde_json::json!(v.max(1)));
    }
    if let Some(v) = body.ocr_concurrency {
        applied.insert("ocrConcurrency".into(), serde_json::json!(v.max(1)));
    }
    if let Some(v) = body.job_timeout_s {
        applied.insert("jobTimeoutS".into(), serde_json::json!(v));
    }
    if let Some(ref v) = body.default_ocr_lang {
        applied.insert("defaultOcrLang".into(), serde_json::json!(v));
    }

    state.shared.patch_runtime_config(|cfg: &mut RuntimeConfig| {
        if let Some(v) = body.prep_concurrency {
            cfg.prep_concurrency = v.max(1);
        }
        if let Some(v) = body.ocr_concurrency {
            cfg.ocr_concurrency = v.max(1);
        }
        if let Some(v) = body.job_timeout_s {
            cfg.job_timeout_s = v;
        }
        if let Some(v) = body.default_ocr_lang {
            cfg.default_ocr_lang = v;
        }
    });
    Json(serde_json::json!({ "applied": applied }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobStore;
    use axum::body::Body;
    use axum::http::Request;
    use ocrflow_protocol::DataLayout;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = JobStore::new(layout);
        store.ensure_layout().unwrap();
        let shared = Shared::new(RuntimeConfig {
            prep_concurrency: 2,
            ocr_concurrency: 1,
            job_timeout_s: 600,
            default_ocr_lang: "eng".into(),
        });
        router(shared, Arc::new(store))
    }

    #[tokio::test]
    async fn healthz_reports_503_before_ready() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_job_key_returns_404() {
        let app = test_router();
        let key = format!("{}__{}", "a".repeat(64), "b".repeat(64));
        let resp = app
            .oneshot(Request::builder().uri(format!("/jobs/{key}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_job_key_returns_400() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/jobs/not-a-key").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_round_trips_through_patch() {
        let app = test_router();
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/config")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prepConcurrency":5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "applied": { "prepConcurrency": 5 } }));

        let resp = app
            .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let cfg: RuntimeConfig = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(cfg.prep_concurrency, 5);
        assert_eq!(cfg.ocr_concurrency, 1);
    }
}
