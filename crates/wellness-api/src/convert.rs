//! Row -> API model conversion.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use wellness_db::models::{SessionRow, UserRow};
use wellness_types::models::{SessionRecord, SessionStatus, User};

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn parse_timestamp(value: &str, what: &str, row_id: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", what, value, row_id, e);
        DateTime::default()
    })
}

fn parse_uuid(value: &str, what: &str, row_id: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", what, value, row_id, e);
        Uuid::default()
    })
}

pub fn user_from_row(row: &UserRow) -> User {
    User {
        id: parse_uuid(&row.id, "user id", &row.id),
        email: row.email.clone(),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        last_login: row
            .last_login_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, "last_login_at", &row.id)),
    }
}

pub fn session_from_row(row: SessionRow) -> SessionRecord {
    let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_else(|e| {
        warn!("Corrupt tags '{}' on session '{}': {}", row.tags, row.id, e);
        Vec::new()
    });
    let status = row.status.parse().unwrap_or_else(|e| {
        warn!("{} on session '{}'", e, row.id);
        SessionStatus::Draft
    });

    SessionRecord {
        id: parse_uuid(&row.id, "session id", &row.id),
        user_id: parse_uuid(&row.user_id, "user_id", &row.id),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.id),
        title: row.title,
        tags,
        json_file_url: row.json_file_url,
        status,
    }
}
