//! HTTP surface of the service: administrative CRUD over the configuration
//! store, annotation authoring, and the render-session lifecycle. The
//! decision endpoints live in `visibility::web`.
//!
//! Administrative writes mutate the configuration store only; they take
//! effect on the next session load, never retroactively within an
//! in-flight session.
use crate::errors::UmbraError;
use crate::session::RenderSessionKey;
use crate::settings::Settings;
use crate::storage;
use crate::visibility;
use crate::visibility::normalize;
use crate::visibility::registry::PropertyPermissionRegistry;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
    pub registry: Arc<PropertyPermissionRegistry>,
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let state = AppState {
        settings: Arc::new(settings),
        db,
        registry: Arc::new(PropertyPermissionRegistry::new()),
    };

    let router = Router::new()
        // Level catalog administration
        .route("/admin/levels", get(list_levels).post(create_level))
        .route(
            "/admin/levels/{id}",
            axum::routing::put(update_level).delete(delete_level),
        )
        // Group -> max level assignments
        .route("/admin/groups", get(list_groups).put(assign_group))
        .route("/admin/groups/{group}", delete(remove_group))
        // Annotation authoring
        .route(
            "/annotations/{property}",
            get(get_annotation).put(set_annotation),
        )
        // Render session lifecycle + property registry
        .route(
            "/render-sessions",
            post(begin_render_session).delete(end_render_session),
        )
        .route("/registry/register", post(register_property))
        .route("/registry/properties/{property}", get(property_levels))
        .with_state(state.clone())
        .merge(visibility::web::router(state.clone()));

    let addr = state.settings.bind_addr();
    tracing::info!(%addr, "umbra listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

// ---------- Level catalog ----------

#[derive(Debug, Deserialize)]
struct LevelUpsertRequest {
    name: String,
    rank: u32,
    #[serde(default)]
    reference: Option<String>,
}

/// Level names are restricted to word characters so they survive every
/// identifier context (annotations, page references, config keys).
fn valid_level_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn list_levels(State(state): State<AppState>) -> impl IntoResponse {
    match storage::list_levels(&state.db).await {
        Ok(levels) => Json(levels).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn create_level(
    State(state): State<AppState>,
    Json(req): Json<LevelUpsertRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_level_upsert(&state.db, &req, None).await {
        return e.into_response();
    }

    match storage::create_level(&state.db, &req.name, req.rank, req.reference.clone()).await {
        Ok(level) => {
            tracing::info!(name = %level.name, rank = level.rank, "Created visibility level");
            (StatusCode::CREATED, Json(level)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn update_level(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<LevelUpsertRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_level_upsert(&state.db, &req, Some(id)).await {
        return e.into_response();
    }

    match storage::update_level(&state.db, id, &req.name, req.rank, req.reference.clone()).await {
        Ok(level) => {
            tracing::info!(id, name = %level.name, rank = level.rank, "Updated visibility level");
            Json(level).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn delete_level(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match storage::delete_level(&state.db, id).await {
        Ok(()) => {
            tracing::info!(id, "Deleted visibility level");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn validate_level_upsert(
    db: &DatabaseConnection,
    req: &LevelUpsertRequest,
    updating: Option<i32>,
) -> Result<(), UmbraError> {
    if !valid_level_name(&req.name) {
        return Err(UmbraError::BadRequest(format!(
            "invalid level name `{}` (letters, digits, and underscores only)",
            req.name
        )));
    }

    if let Some(existing) = storage::get_level_by_name(db, &req.name).await? {
        if updating != Some(existing.id) {
            return Err(UmbraError::BadRequest(format!(
                "a level named `{}` already exists",
                existing.name
            )));
        }
    }

    Ok(())
}

// ---------- Group assignments ----------

#[derive(Debug, Deserialize)]
struct GroupAssignRequest {
    group: String,
    level: String,
}

#[derive(Debug, Serialize)]
struct GroupAssignResponse {
    group: String,
    level: String,
}

async fn list_groups(State(state): State<AppState>) -> impl IntoResponse {
    match storage::list_group_levels(&state.db).await {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn assign_group(
    State(state): State<AppState>,
    Json(req): Json<GroupAssignRequest>,
) -> impl IntoResponse {
    let group = normalize::normalize(&req.group);
    if group.is_empty() {
        return UmbraError::BadRequest("group name must be a non-empty string".into())
            .into_response();
    }

    // The referenced level must exist before the assignment is accepted
    let level = match storage::get_level_by_name(&state.db, &req.level).await {
        Ok(Some(level)) => level,
        Ok(None) => {
            return UmbraError::BadRequest(format!("unknown level `{}`", req.level)).into_response()
        }
        Err(e) => return e.into_response(),
    };

    match storage::set_group_max_level(&state.db, &group, &level.name).await {
        Ok(()) => {
            tracing::info!(%group, level = %level.name, "Assigned group max level");
            Json(GroupAssignResponse {
                group,
                level: level.name,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn remove_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> impl IntoResponse {
    let group = normalize::normalize(&group);
    match storage::remove_group_mapping(&state.db, &group).await {
        Ok(()) => {
            tracing::info!(%group, "Removed group mapping");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

// ---------- Annotation authoring ----------

#[derive(Debug, Deserialize)]
struct AnnotationRequest {
    #[serde(default)]
    level: Option<String>,
    /// Group tokens; entries may themselves be comma-separated lists
    #[serde(default)]
    visible_to: Vec<String>,
}

async fn get_annotation(
    State(state): State<AppState>,
    Path(property): Path<String>,
) -> impl IntoResponse {
    match storage::get_annotation(&state.db, &property).await {
        Ok(Some(annotation)) => Json(annotation).into_response(),
        Ok(None) => UmbraError::NotFound(format!("no annotation for property `{property}`"))
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn set_annotation(
    State(state): State<AppState>,
    Path(property): Path<String>,
    Json(req): Json<AnnotationRequest>,
) -> impl IntoResponse {
    if normalize::normalize(&property).is_empty() {
        return UmbraError::BadRequest("property key must be a non-empty string".into())
            .into_response();
    }

    let mut visible_to: Vec<String> = Vec::new();
    for entry in &req.visible_to {
        for token in normalize::split_list(entry) {
            if !visible_to.contains(&token) {
                visible_to.push(token);
            }
        }
    }

    match storage::set_annotation(&state.db, &property, req.level.as_deref(), &visible_to).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// ---------- Render sessions + registry ----------

#[derive(Debug, Serialize)]
struct RenderSessionResponse {
    session_key: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    property: String,
    level: String,
}

async fn begin_render_session() -> impl IntoResponse {
    let key = RenderSessionKey::generate();
    tracing::debug!(session = key.as_str(), "Began render session");
    (
        StatusCode::CREATED,
        Json(RenderSessionResponse {
            session_key: key.as_str().to_string(),
        }),
    )
}

async fn end_render_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(key) = RenderSessionKey::from_headers(&headers) else {
        return missing_session_header();
    };

    state.registry.reset(key.as_str());
    tracing::debug!(session = key.as_str(), "Reset render session registry");
    StatusCode::NO_CONTENT.into_response()
}

async fn register_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let Some(key) = RenderSessionKey::from_headers(&headers) else {
        return missing_session_header();
    };

    state
        .registry
        .register(key.as_str(), &req.property, &req.level);
    StatusCode::NO_CONTENT.into_response()
}

async fn property_levels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property): Path<String>,
) -> impl IntoResponse {
    let Some(key) = RenderSessionKey::from_headers(&headers) else {
        return missing_session_header();
    };

    let levels = state.registry.levels(key.as_str(), &property);
    let protected = !levels.is_empty();
    Json(json!({ "levels": levels, "protected": protected })).into_response()
}

fn missing_session_header() -> axum::response::Response {
    UmbraError::BadRequest(format!(
        "missing or empty `{}` header",
        crate::session::RENDER_SESSION_HEADER
    ))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_level_name() {
        assert!(valid_level_name("pi_only"));
        assert!(valid_level_name("Internal2"));
        assert!(!valid_level_name(""));
        assert!(!valid_level_name("pi only"));
        assert!(!valid_level_name("Visibility:PI"));
    }
}
