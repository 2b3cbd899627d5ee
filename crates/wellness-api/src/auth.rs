use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use wellness_db::Database;
use wellness_types::api::{AuthResponse, Claims, LoginRequest, MeResponse, RegisterRequest};
use wellness_types::rules::is_valid_email;

use crate::convert::{now_timestamp, user_from_row};
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    /// Run a blocking DB call off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
            .map_err(ApiError::from)
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    // Validate input
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Please provide a valid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Fast path; the insert below still guards against a concurrent signup
    let lookup = email.clone();
    if state.run_db(move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(email_taken());
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let created_at = now_timestamp();

    let (id, em, ts) = (user_id.to_string(), email.clone(), created_at.clone());
    let row = state
        .run_db(move |db| {
            if !db.create_user(&id, &em, &password_hash, &ts)? {
                return Ok(None);
            }
            db.get_user_by_id(&id)?
                .ok_or_else(|| anyhow::anyhow!("user {} missing after insert", id))
                .map(Some)
        })
        .await?
        .ok_or_else(|| {
            warn!("Concurrent registration lost for {}", email);
            email_taken()
        })?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &email)?;

    info!("Registered user {}", email);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user_from_row(&row),
        }),
    ))
}

fn email_taken() -> ApiError {
    ApiError::Conflict("An account with this email already exists".to_string())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let lookup = email.clone();
    let user = state
        .run_db(move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or_else(invalid)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e))?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Failed login for {}", email);
        return Err(invalid());
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let id = user.id.clone();
    let row = state
        .run_db(move |db| {
            db.touch_last_login(&id, &now_timestamp())?;
            db.get_user_by_id(&id)?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished during login", id))
        })
        .await?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &row.email)?;

    Ok(Json(AuthResponse {
        token,
        user: user_from_row(&row),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let row = state
        .run_db(move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(Json(MeResponse {
        user: user_from_row(&row),
    }))
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: Uuid,
    email: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
