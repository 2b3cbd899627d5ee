use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use wellness_types::api::{
    AuthResponse, ErrorBody, LoginRequest, MeResponse, MessageResponse, RegisterRequest,
    SessionListResponse, SessionMutationResponse, SessionPayload,
};
use wellness_types::models::{SessionRecord, SessionStatus, User};

use crate::editor::SessionStore;
use crate::error::StoreError;
use crate::session::{AuthSession, StoredAuth};

/// Query for the public listing.
#[derive(Debug, Clone, Default)]
pub struct PublishedQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub tags: Vec<String>,
    pub search: Option<String>,
}

/// REST client for the wellness sessions API.
///
/// Authenticated calls take the bearer token from the [`AuthSession`];
/// a 401 on any of them tears that session down.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: AuthSession,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: AuthSession) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, session: AuthSession) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Auth --

    pub async fn register(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(self.url("/auth/register")).json(&body).send().await?;
        let auth: AuthResponse = self.decode(resp, false).await?;
        self.adopt(auth)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(self.url("/auth/login")).json(&body).send().await?;
        let auth: AuthResponse = self.decode(resp, false).await?;
        self.adopt(auth)
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.session.teardown()?;
        Ok(())
    }

    /// Load a stored login and confirm the server still accepts it.
    /// Returns `None` when there was nothing to restore or the token was stale.
    pub async fn restore_session(&self) -> Result<Option<User>, StoreError> {
        if !self.session.init_from_storage()? {
            return Ok(None);
        }
        match self.me().await {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn me(&self) -> Result<User, StoreError> {
        let resp = self.authed(self.http.get(self.url("/auth/me")))?.send().await?;
        let me: MeResponse = self.decode(resp, true).await?;
        Ok(me.user)
    }

    fn adopt(&self, auth: AuthResponse) -> Result<User, StoreError> {
        let user = auth.user.clone();
        self.session.establish(StoredAuth {
            token: auth.token,
            user: auth.user,
        })?;
        Ok(user)
    }

    // -- Sessions --

    pub async fn list_published(
        &self,
        query: &PublishedQuery,
    ) -> Result<SessionListResponse, StoreError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if !query.tags.is_empty() {
            params.push(("tags", query.tags.join(",")));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        let resp = self
            .http
            .get(self.url("/sessions"))
            .query(&params)
            .send()
            .await?;
        self.decode(resp, false).await
    }

    pub async fn list_mine(
        &self,
        status: Option<SessionStatus>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<SessionListResponse, StoreError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            params.push(("status", status.to_string()));
        }
        if let Some(page) = page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }

        let req = self.http.get(self.url("/my-sessions")).query(&params);
        let resp = self.authed(req)?.send().await?;
        self.decode(resp, true).await
    }

    pub async fn get_mine(&self, id: Uuid) -> Result<SessionRecord, StoreError> {
        let req = self.http.get(self.url(&format!("/my-sessions/{}", id)));
        let resp = self.authed(req)?.send().await?;
        self.decode(resp, true).await
    }

    pub async fn save_draft(&self, payload: &SessionPayload) -> Result<SessionRecord, StoreError> {
        self.mutate("/my-sessions/save-draft", payload).await
    }

    pub async fn publish(&self, payload: &SessionPayload) -> Result<SessionRecord, StoreError> {
        self.mutate("/my-sessions/publish", payload).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let req = self.http.delete(self.url(&format!("/my-sessions/{}", id)));
        let resp = self.authed(req)?.send().await?;
        let _: MessageResponse = self.decode(resp, true).await?;
        Ok(())
    }

    async fn mutate(
        &self,
        path: &str,
        payload: &SessionPayload,
    ) -> Result<SessionRecord, StoreError> {
        let req = self.http.post(self.url(path)).json(payload);
        let resp = self.authed(req)?.send().await?;
        let body: SessionMutationResponse = self.decode(resp, true).await?;
        debug!("{} -> {}", path, body.message);
        Ok(body.session)
    }

    // -- Plumbing --

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let token = self.session.token().ok_or(StoreError::NotAuthenticated)?;
        Ok(req.bearer_auth(token))
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        resp: Response,
        authed: bool,
    ) -> Result<T, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or_else(|_| if text.is_empty() { status.to_string() } else { text });

        match status {
            StatusCode::UNAUTHORIZED => {
                if authed {
                    warn!("Token rejected by server, signing out");
                    self.session.teardown()?;
                }
                Err(StoreError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(message)),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(StoreError::Validation(message))
            }
            _ => Err(StoreError::Server {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl SessionStore for ApiClient {
    async fn persist_draft(&self, payload: SessionPayload) -> Result<SessionRecord, StoreError> {
        self.save_draft(&payload).await
    }

    async fn persist_published(
        &self,
        payload: SessionPayload,
    ) -> Result<SessionRecord, StoreError> {
        self.publish(&payload).await
    }
}
