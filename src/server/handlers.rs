use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::store::{queries, StoreError};
use crate::sync::SyncJob;
use crate::{ingest, scrape, sync};

#[derive(Debug, Deserialize)]
pub struct IdPayload {
    pub id: String,
}

/// Windowed "today" feed plus stats from the same snapshot.
pub async fn get_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();
    let window = state.config.window();
    Json(json!({
        "articles": queries::feed(&snapshot, now, window),
        "stats": queries::stats(&snapshot, now, window),
    }))
}

pub async fn get_saved(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();
    Json(json!({
        "articles": queries::saved(&snapshot),
        "stats": queries::stats(&snapshot, now, state.config.window()),
    }))
}

pub async fn get_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();
    Json(json!({
        "articles": snapshot.articles,
        "stats": queries::stats(&snapshot, now, state.config.window()),
    }))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    Json(queries::stats(&snapshot, Utc::now(), state.config.window()))
}

/// Manual refresh: scrape every source, merge into the store, kick off a
/// background mirror sync. Remote failures never surface here; only a local
/// persistence problem is an error.
pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::info!("Manual refresh triggered");
    let (batches, record) = scrape::run_all(&state.http, &state.config).await;

    let summary = match ingest::merge_and_store(&state.store, batches, Utc::now()).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Refresh failed to persist merge");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response();
        }
    };

    if let Err(e) = state.store.append_run(&record).await {
        tracing::warn!(error = %e, "Failed to append run to local audit log");
    }

    let snapshot = state.store.snapshot().await;
    state.sync.enqueue(SyncJob::Upsert(snapshot.articles));
    state.sync.enqueue(SyncJob::LogRun(record.clone()));

    Json(json!({ "status": "ok", "scrape": record, "store": summary })).into_response()
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IdPayload>,
) -> impl IntoResponse {
    if payload.id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "Missing id" })),
        )
            .into_response();
    }

    match state.store.mark_saved(&payload.id, Utc::now()).await {
        Ok(article) => {
            state.sync.enqueue(SyncJob::Upsert(vec![article.clone()]));
            Json(json!({ "status": "ok", "article": article })).into_response()
        }
        Err(StoreError::NotFound(_)) => not_found(),
        Err(e) => internal_error(e),
    }
}

/// Unsave is destructive: the article is removed locally and a hard delete
/// is queued against the mirror.
pub async fn unsave(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IdPayload>,
) -> impl IntoResponse {
    if payload.id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "Missing id" })),
        )
            .into_response();
    }

    match state.store.remove(&payload.id).await {
        Ok(removed) => {
            state.sync.enqueue(SyncJob::Delete(removed.id));
            Json(json!({ "status": "ok" })).into_response()
        }
        Err(StoreError::NotFound(_)) => not_found(),
        Err(e) => internal_error(e),
    }
}

/// Manual full resync of the mirror from the local store.
pub async fn full_sync(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(remote) = &state.remote else {
        return mirror_unconfigured();
    };
    match sync::full_sync(remote, &state.store).await {
        Ok(report) => Json(json!({ "status": "ok", "pushed": report.pushed, "failed": report.failed }))
            .into_response(),
        Err(e) => remote_error(e),
    }
}

/// Manual reverse pull: seed the local store from the mirror.
pub async fn pull(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(remote) = &state.remote else {
        return mirror_unconfigured();
    };
    match sync::pull_from_remote(remote, &state.store).await {
        Ok(restored) => Json(json!({ "status": "ok", "restored": restored })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Pull from mirror failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "not_found" })),
    )
        .into_response()
}

fn internal_error(e: StoreError) -> axum::response::Response {
    tracing::error!(error = %e, "Store operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": e.to_string() })),
    )
        .into_response()
}

fn mirror_unconfigured() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "error", "message": "Cloud mirror not configured" })),
    )
        .into_response()
}

fn remote_error(e: crate::sync::RemoteError) -> axum::response::Response {
    tracing::error!(error = %e, "Remote sync failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "status": "error", "message": e.to_string() })),
    )
        .into_response()
}
