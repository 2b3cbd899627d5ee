use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{SessionRecord, User};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the token issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
}

// -- Sessions --

/// Body of save-draft and publish. `id` absent means "create".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub json_file_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMutationResponse {
    pub message: String,
    pub session: SessionRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_sessions: u64,
    pub has_next_page: bool,
}

impl Pagination {
    pub fn new(current_page: u32, limit: u32, total_sessions: u64) -> Self {
        let limit = u64::from(limit.max(1));
        let total_pages = total_sessions.div_ceil(limit) as u32;
        Self {
            current_page,
            total_pages,
            total_sessions,
            has_next_page: current_page < total_pages,
        }
    }
}

// -- Generic bodies --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_pages_up() {
        let p = Pagination::new(1, 10, 21);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);

        let last = Pagination::new(3, 10, 21);
        assert!(!last.has_next_page);
    }

    #[test]
    fn pagination_with_no_sessions() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
    }

    #[test]
    fn pagination_serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(2, 5, 11)).unwrap();
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["totalSessions"], 11);
        assert_eq!(json["hasNextPage"], true);
    }

    #[test]
    fn payload_defaults_missing_fields() {
        let payload: SessionPayload = serde_json::from_str(r#"{"title":"Dawn"}"#).unwrap();
        assert_eq!(payload.id, None);
        assert_eq!(payload.title, "Dawn");
        assert!(payload.tags.is_empty());
        assert_eq!(payload.json_file_url, "");
    }
}
