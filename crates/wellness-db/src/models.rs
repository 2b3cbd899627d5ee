//! Database row types. These map directly to SQLite rows and stay
//! independent of the wellness-types API models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// JSON array of strings
    pub tags: String,
    pub json_file_url: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}
