//! Field rules shared by the server and the editor client.
//!
//! Drafts only have to respect the length limits. Publishing additionally
//! requires a non-empty title and a valid `http(s)://` data URL.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Tags,
    JsonFileUrl,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Tags => "tags",
            Self::JsonFileUrl => "json_file_url",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Split comma-separated tag input into lowercase tags.
///
/// Empty entries are dropped; duplicates are kept in input order.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Trim and lowercase a tag list, enforcing the per-tag length limit.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, FieldError> {
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(FieldError::new(
                Field::Tags,
                format!("Each tag must be at most {} characters", MAX_TAG_LEN),
            ));
        }
        out.push(tag);
    }
    Ok(out)
}

pub fn normalize_title(title: &str) -> Result<String, FieldError> {
    let title = title.trim();
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(FieldError::new(
            Field::Title,
            format!("Title must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(title.to_string())
}

/// `http://` or `https://` followed by at least one character.
pub fn is_valid_data_url(url: &str) -> bool {
    let url = url.trim();
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}

/// Check the completeness a published record must satisfy.
///
/// Returns one error per failing field so callers can show them side by side.
pub fn check_publishable(title: &str, json_file_url: &str) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if title.trim().is_empty() {
        errors.push(FieldError::new(Field::Title, "Title is required to publish"));
    }

    let url = json_file_url.trim();
    if url.is_empty() {
        errors.push(FieldError::new(
            Field::JsonFileUrl,
            "JSON file URL is required to publish",
        ));
    } else if !is_valid_data_url(url) {
        errors.push(FieldError::new(
            Field::JsonFileUrl,
            "JSON file URL must start with http:// or https://",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Loose `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_lowercases_and_keeps_duplicates() {
        assert_eq!(parse_tags("Yoga, Calm, yoga"), vec!["yoga", "calm", "yoga"]);
    }

    #[test]
    fn parse_tags_drops_empty_entries() {
        assert_eq!(parse_tags(" , breath,, "), vec!["breath"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn normalize_tags_rejects_long_tag() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        let err = normalize_tags(&[long]).unwrap_err();
        assert_eq!(err.field, Field::Tags);

        let ok = normalize_tags(&["  Stretch ".to_string(), String::new()]).unwrap();
        assert_eq!(ok, vec!["stretch"]);
    }

    #[test]
    fn normalize_title_limits_length() {
        assert_eq!(normalize_title("  Evening Wind Down ").unwrap(), "Evening Wind Down");
        assert!(normalize_title(&"t".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(normalize_title(&"t".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn data_url_requires_http_scheme() {
        assert!(is_valid_data_url("https://cdn.example.com/flow.json"));
        assert!(is_valid_data_url("http://x"));
        assert!(!is_valid_data_url("not-a-url"));
        assert!(!is_valid_data_url("ftp://example.com/a.json"));
        assert!(!is_valid_data_url("https://"));
        assert!(!is_valid_data_url(""));
    }

    #[test]
    fn publish_check_reports_each_field() {
        let errs = check_publishable("   ", "not-a-url").unwrap_err();
        let fields: Vec<Field> = errs.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Title, Field::JsonFileUrl]);

        let errs = check_publishable("Morning Flow", "not-a-url").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, Field::JsonFileUrl);

        assert!(check_publishable("Morning Flow", "https://example.com/flow.json").is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana example@x.io"));
        assert!(!is_valid_email("a@b@c.io"));
    }
}
