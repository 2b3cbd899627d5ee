use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use wellness_db::PublishedFilter;
use wellness_db::models::SessionRow;
use wellness_types::api::{
    Claims, MessageResponse, Pagination, SessionListResponse, SessionMutationResponse,
    SessionPayload,
};
use wellness_types::models::SessionStatus;
use wellness_types::rules::{check_publishable, normalize_tags, normalize_title, parse_tags};

use crate::auth::AppState;
use crate::convert::{now_timestamp, session_from_row};
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PublishedQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Comma-separated; a session matches when it carries any of them.
    pub tags: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MySessionsQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved `(page, limit, offset)` for a listing request.
fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = u64::from(page - 1) * u64::from(limit);
    (page, limit, offset)
}

/// GET /sessions: published sessions, public.
pub async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PublishedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit, offset) = page_window(query.page, query.limit);
    let filter = PublishedFilter {
        tags: query.tags.as_deref().map(parse_tags).unwrap_or_default(),
        search: query.search,
    };

    let (rows, total) = state
        .run_db(move |db| db.list_published_sessions(&filter, limit, offset))
        .await?;

    Ok(Json(SessionListResponse {
        sessions: rows.into_iter().map(session_from_row).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

/// GET /my-sessions: the caller's sessions, optionally filtered by status.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MySessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<SessionStatus>()
                .map_err(|e| ApiError::validation(e.to_string()))?,
        ),
        None => None,
    };
    let (page, limit, offset) = page_window(query.page, query.limit);
    let user_id = claims.sub.to_string();

    let (rows, total) = state
        .run_db(move |db| {
            db.list_user_sessions(&user_id, status.map(|s| s.as_str()), limit, offset)
        })
        .await?;

    Ok(Json(SessionListResponse {
        sessions: rows.into_iter().map(session_from_row).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

/// GET /my-sessions/{id}: one of the caller's sessions.
///
/// Unknown ids, malformed ids and other users' sessions all answer 404.
pub async fn get_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = id.parse::<Uuid>().map_err(|_| ApiError::session_not_found())?;
    let user_id = claims.sub.to_string();

    let row = state
        .run_db(move |db| db.get_owned_session(&id.to_string(), &user_id))
        .await?
        .ok_or_else(ApiError::session_not_found)?;

    Ok(Json(session_from_row(row)))
}

/// POST /my-sessions/save-draft
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    persist(&state, &claims, payload, SessionStatus::Draft).await
}

/// POST /my-sessions/publish: same body as save-draft, but the record
/// must be complete.
pub async fn publish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(errors) = check_publishable(&payload.title, &payload.json_file_url) {
        warn!("Publish rejected for {}: {} invalid field(s)", claims.email, errors.len());
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ApiError::Validation(message));
    }

    persist(&state, &claims, payload, SessionStatus::Published).await
}

/// DELETE /my-sessions/{id}
pub async fn delete_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = id.parse::<Uuid>().map_err(|_| ApiError::session_not_found())?;
    let user_id = claims.sub.to_string();

    let deleted = state
        .run_db(move |db| db.delete_owned_session(&id.to_string(), &user_id))
        .await?;
    if !deleted {
        return Err(ApiError::session_not_found());
    }

    info!("Session {} deleted by {}", id, claims.email);
    Ok(Json(MessageResponse {
        message: "Session deleted successfully".to_string(),
    }))
}

/// Create or update the caller's session with the given status.
async fn persist(
    state: &AppState,
    claims: &Claims,
    payload: SessionPayload,
    status: SessionStatus,
) -> Result<(StatusCode, Json<SessionMutationResponse>), ApiError> {
    let title = normalize_title(&payload.title).map_err(|e| ApiError::Validation(e.message))?;
    let tags = normalize_tags(&payload.tags).map_err(|e| ApiError::Validation(e.message))?;
    let tags = serde_json::to_string(&tags).map_err(anyhow::Error::from)?;

    let now = now_timestamp();
    let row = SessionRow {
        id: payload.id.unwrap_or_else(Uuid::new_v4).to_string(),
        user_id: claims.sub.to_string(),
        title,
        tags,
        json_file_url: payload.json_file_url.trim().to_string(),
        status: status.as_str().to_string(),
        created_at: now.clone(),
        updated_at: now,
    };

    let (code, stored) = if payload.id.is_some() {
        let stored = state
            .run_db(move |db| db.update_owned_session(&row))
            .await?
            .ok_or_else(ApiError::session_not_found)?;
        (StatusCode::OK, stored)
    } else {
        let stored = state
            .run_db(move |db| {
                db.insert_session(&row)?;
                Ok(row)
            })
            .await?;
        (StatusCode::CREATED, stored)
    };

    let message = match status {
        SessionStatus::Draft => "Session saved as draft",
        SessionStatus::Published => "Session published successfully",
    };
    info!("Session {} {} by {}", stored.id, status, claims.email);

    Ok((
        code,
        Json(SessionMutationResponse {
            message: message.to_string(),
            session: session_from_row(stored),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (1, 10, 0));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(page_window(Some(3), Some(500)), (3, 100, 200));
        assert_eq!(page_window(Some(2), Some(5)), (2, 5, 5));
    }
}
