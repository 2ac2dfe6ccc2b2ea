use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::visibility::evaluator::PermissionEvaluator;
use crate::visibility::loader;
use crate::visibility::normalize;
use crate::visibility::resolver::{AnnotationStore, VisibilityResolver};
use crate::visibility::types::{
    CheckGroupsRequest, CheckLevelRequest, CheckResponse, DecideRequest, DecideResponse,
};
use crate::web::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/decide", post(handle_decide))
        .route("/v1/check-level", post(handle_check_level))
        .route("/v1/check-groups", post(handle_check_groups))
        .route("/healthz", get(health))
        .with_state(state)
}

/// One fresh snapshot + resolver + evaluator set per request: request
/// caches live and die with the request, and admin changes apply from the
/// next request on.
async fn handle_decide(
    State(state): State<AppState>,
    Json(req): Json<DecideRequest>,
) -> impl IntoResponse {
    let config = match loader::load_snapshot(&state.db, &state.settings).await {
        Ok(config) => Arc::new(config),
        Err(e) => return e.into_response(),
    };

    let mut resolver =
        VisibilityResolver::new(config.clone(), AnnotationStore::new(state.db.clone()));
    let mut evaluator = PermissionEvaluator::new(config);

    match evaluator.decide(&mut resolver, &req.subject, &req.property).await {
        Ok(allowed) => Json(DecideResponse { allowed }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Direct numeric check against a level name. An unknown level name denies.
async fn handle_check_level(
    State(state): State<AppState>,
    Json(req): Json<CheckLevelRequest>,
) -> impl IntoResponse {
    let config = match loader::load_snapshot(&state.db, &state.settings).await {
        Ok(config) => Arc::new(config),
        Err(e) => return e.into_response(),
    };

    let mut evaluator = PermissionEvaluator::new(config.clone());
    let profile = match evaluator.profile(&req.subject) {
        Ok(profile) => profile,
        Err(e) => return e.into_response(),
    };

    let allowed = match config.level_rank(&req.level) {
        Some(rank) => evaluator.may_view(&profile, rank, &[]),
        None => {
            tracing::debug!(level = %req.level, "unknown required level; denying");
            false
        }
    };

    Json(CheckResponse { allowed }).into_response()
}

/// Direct allow-list check against group or group-set names.
async fn handle_check_groups(
    State(state): State<AppState>,
    Json(req): Json<CheckGroupsRequest>,
) -> impl IntoResponse {
    let config = match loader::load_snapshot(&state.db, &state.settings).await {
        Ok(config) => Arc::new(config),
        Err(e) => return e.into_response(),
    };

    let mut evaluator = PermissionEvaluator::new(config);
    let profile = match evaluator.profile(&req.subject) {
        Ok(profile) => profile,
        Err(e) => return e.into_response(),
    };

    // Entries may themselves be comma-separated author lists
    let mut tokens: Vec<String> = Vec::new();
    for entry in &req.groups {
        for token in normalize::split_list(entry) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    let allowed = evaluator.group_access(&profile, &tokens);
    Json(CheckResponse { allowed }).into_response()
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
