//! Token issuance and validation.
//!
//! - [`OAuth2State::authorize`] validates a bearer token
//! - [`OAuth2State::issue_token`] runs the token endpoint grants
//! - [`OAuth2State::issue_client`] rotates the client credentials of a logged-in user

use axum::http::{HeaderMap, Method, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, GrantError, StorageError};
use crate::metrics::{AUTH_FAILURES, AUTH_SUCCESSES, CLIENT_GENERATIONS, TOKEN_GENERATIONS};
use crate::oauth2::clients::Client;
use crate::oauth2::state::OAuth2State;
use crate::oauth2::tokens::TokenInfo;
use crate::utils::{constant_time_eq, generate_id, generate_token};

pub const TOKEN_TYPE: &str = "Bearer";

/// Token endpoint parameters, from the form body or the query string.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPayload {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A minted token together with the user it was issued for.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub payload: TokenPayload,
    pub user_id: String,
}

/// Client id and secret presented at the token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrantType {
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    fn parse(raw: Option<&str>) -> Result<Self, GrantError> {
        match raw {
            Some("client_credentials") => Ok(GrantType::ClientCredentials),
            Some("refresh_token") => Ok(GrantType::RefreshToken),
            _ => Err(GrantError::UnsupportedGrantType),
        }
    }
}

/// Client credentials from HTTP Basic auth, falling back to the request parameters.
///
/// Returns `None` unless both an id and a secret are present.
pub fn extract_client_credentials(
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Option<ClientCredentials> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) = STANDARD.decode(auth.trim())
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        // RFC 6749 section 2.3.1: both halves are form-urlencoded
        return match (form_decode(id), form_decode(secret)) {
            (Some(id), Some(secret)) => non_empty_pair(&id, &secret),
            _ => None,
        };
    }

    non_empty_pair(
        request.client_id.as_deref().unwrap_or_default(),
        request.client_secret.as_deref().unwrap_or_default(),
    )
}

fn form_decode(raw: &str) -> Option<String> {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn non_empty_pair(id: &str, secret: &str) -> Option<ClientCredentials> {
    if id.is_empty() || secret.is_empty() {
        return None;
    }
    Some(ClientCredentials {
        id: id.to_string(),
        secret: secret.to_string(),
    })
}

/// Bearer token from the `Authorization` header, else the `access_token` query parameter.
pub fn extract_bearer_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .or(query_token)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl OAuth2State {
    /// Validate the bearer token carried by a request.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<TokenInfo, GrantError> {
        let result = self.validate_bearer(headers, query_token).await;
        let counter = if result.is_ok() {
            AUTH_SUCCESSES
        } else {
            AUTH_FAILURES
        };
        self.metrics.increment(counter, &[("method", "oauth2")]);
        result
    }

    async fn validate_bearer(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<TokenInfo, GrantError> {
        let access = extract_bearer_token(headers, query_token)
            .ok_or(GrantError::InvalidToken("The access token is missing"))?;
        let token = self
            .tokens
            .get_by_access(&access)
            .await?
            .ok_or(GrantError::InvalidToken("The access token is invalid"))?;
        if !token.is_access_valid_at(OffsetDateTime::now_utc()) {
            return Err(GrantError::InvalidToken("The access token expired"));
        }
        if token.client_id.is_empty() {
            return Err(GrantError::InvalidToken("missing client_id"));
        }
        Ok(token)
    }

    /// Handle a token endpoint request.
    pub async fn issue_token(
        &self,
        method: &Method,
        credentials: Option<ClientCredentials>,
        request: &TokenRequest,
    ) -> Result<IssuedToken, GrantError> {
        if method == Method::GET && !self.settings.allow_get_access_request {
            return Err(GrantError::InvalidRequest(
                "GET token requests are not allowed",
            ));
        }
        let grant = GrantType::parse(request.grant_type.as_deref())?;
        let credentials = credentials.ok_or(GrantError::InvalidClient)?;
        let client = self.authenticate_client(&credentials).await?;

        let issued = match grant {
            GrantType::ClientCredentials => {
                let scope = request.scope.clone().unwrap_or_default();
                self.mint(&client, &client.user_id, scope).await?
            }
            GrantType::RefreshToken => self.refresh(&client, request).await?,
        };

        self.metrics.increment(TOKEN_GENERATIONS, &[]);
        Ok(issued)
    }

    async fn authenticate_client(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Client, GrantError> {
        let client = self
            .clients
            .get_by_id(&credentials.id)
            .await?
            .ok_or(GrantError::InvalidClient)?;
        if !constant_time_eq(client.secret.as_bytes(), credentials.secret.as_bytes()) {
            return Err(GrantError::InvalidClient);
        }
        Ok(client)
    }

    async fn refresh(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<IssuedToken, GrantError> {
        let presented = request
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(GrantError::InvalidRequest("refresh_token is required"))?;
        let existing = self
            .tokens
            .get_by_refresh(presented)
            .await?
            .ok_or(GrantError::InvalidGrant("Refresh token not found"))?;
        if existing.client_id != client.id {
            return Err(GrantError::InvalidGrant(
                "Refresh token does not belong to this client",
            ));
        }
        if !existing.is_refresh_valid_at(OffsetDateTime::now_utc()) {
            return Err(GrantError::InvalidGrant("Refresh token expired"));
        }

        let issued = self
            .mint(client, &existing.user_id, existing.scope.clone())
            .await?;
        if !self.tokens.remove_by_access(&existing.access_token).await? {
            // a concurrent refresh consumed the record first
            self.tokens
                .remove_by_access(&issued.payload.access_token)
                .await?;
            return Err(GrantError::InvalidGrant("Refresh token not found"));
        }
        Ok(issued)
    }

    async fn mint(
        &self,
        client: &Client,
        user_id: &str,
        scope: String,
    ) -> Result<IssuedToken, StorageError> {
        let now = OffsetDateTime::now_utc();
        let settings = &self.settings;
        let (refresh_token, refresh_token_expires_at) = if settings.issue_refresh_tokens {
            (
                Some(generate_token()),
                Some(now + settings.refresh_token_lifetime),
            )
        } else {
            (None, None)
        };

        let token = TokenInfo {
            id: uuid::Uuid::new_v4().to_string(),
            access_token: generate_token(),
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            client_id: client.id.clone(),
            user_id: user_id.to_string(),
            scope,
            access_token_expires_at: now + settings.access_token_lifetime,
            refresh_token_expires_at,
            created_at: now,
        };
        self.tokens.create(&token).await?;

        Ok(IssuedToken {
            payload: TokenPayload {
                expires_in: token.expires_in(now),
                access_token: token.access_token,
                token_type: token.token_type,
                refresh_token: token.refresh_token,
                scope: Some(token.scope).filter(|s| !s.is_empty()),
            },
            user_id: token.user_id,
        })
    }

    /// Mint fresh client credentials for the user behind `session_token`.
    pub async fn issue_client(&self, session_token: Option<&str>) -> Result<Vec<Client>, ApiError> {
        let token = session_token.ok_or(ApiError::Forbidden)?;
        let user_id = self.sessions.resolve_session(token).await?;
        Ok(self.rotate_clients(&user_id).await?)
    }

    /// Replace every client of `user_id` with a single new one.
    ///
    /// Not transactional: a failure between delete and create leaves the
    /// user without a client until the next call.
    pub async fn rotate_clients(&self, user_id: &str) -> Result<Vec<Client>, StorageError> {
        let existing = self.clients.get_by_user_id(user_id).await?;
        for old in &existing {
            self.clients.delete_by_id(&old.id).await?;
        }

        let secret = generate_id();
        let client = Client {
            id: generate_id()[..12].to_string(),
            secret,
            domain: self.settings.domain.clone(),
            user_id: user_id.to_string(),
        };
        self.clients.create(&client).await?;

        self.metrics.increment(CLIENT_GENERATIONS, &[]);
        tracing::info!(
            user_id = %user_id,
            client_id = %client.id,
            replaced = existing.len(),
            "rotated oauth2 client"
        );
        Ok(vec![client])
    }

    /// Close the client and token stores. Both are attempted even if one fails.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        let clients = self.clients.close().await;
        let tokens = self.tokens.close().await;
        clients.and(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::memory::MemoryAccounts;
    use crate::accounts::sessions::SessionManager;
    use crate::metrics::Recorder;
    use crate::oauth2::clients::ClientStore;
    use crate::oauth2::state::OAuth2Settings;
    use crate::oauth2::tokens::{MemoryTokenStore, TokenStore};
    use crate::storage::kv::MemoryKvStore;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use time::Duration;

    struct Harness {
        state: OAuth2State,
        metrics: Arc<Recorder>,
        tokens: Arc<MemoryTokenStore>,
    }

    fn harness(settings: OAuth2Settings) -> Harness {
        let metrics = Arc::new(Recorder::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let sessions = SessionManager::new(Arc::new(MemoryAccounts::new()), 3600);
        let state = OAuth2State::new(
            ClientStore::new(Arc::new(MemoryKvStore::new())),
            tokens.clone(),
            sessions,
            metrics.clone(),
            settings,
        );
        Harness {
            state,
            metrics,
            tokens,
        }
    }

    fn creds(client: &Client) -> Option<ClientCredentials> {
        Some(ClientCredentials {
            id: client.id.clone(),
            secret: client.secret.clone(),
        })
    }

    fn grant(kind: &str) -> TokenRequest {
        TokenRequest {
            grant_type: Some(kind.to_string()),
            ..TokenRequest::default()
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn rotation_keeps_exactly_one_client() {
        let h = harness(OAuth2Settings::default());
        let first = h.state.rotate_clients("u1").await.unwrap();
        let second = h.state.rotate_clients("u1").await.unwrap();
        let third = h.state.rotate_clients("u1").await.unwrap();

        assert_eq!(first.len(), 1);
        assert_ne!(first[0].id, second[0].id);
        let live = h.state.clients.get_by_user_id("u1").await.unwrap();
        assert_eq!(live, third);
        assert_eq!(live[0].id.len(), 12);
        assert_eq!(live[0].secret.len(), 40);
        assert_eq!(live[0].domain, "localhost");
        assert_eq!(h.metrics.get(CLIENT_GENERATIONS, &[]), 3);
    }

    #[tokio::test]
    async fn every_rotation_returns_a_fresh_secret() {
        let h = harness(OAuth2Settings::default());
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let client = h.state.rotate_clients("u1").await.unwrap().remove(0);
            assert!(seen.insert(client.secret), "secret handed out twice");
        }
    }

    #[tokio::test]
    async fn rotation_collapses_preexisting_duplicates() {
        let h = harness(OAuth2Settings::default());
        for id in ["dup-a", "dup-b"] {
            h.state
                .clients
                .create(&Client {
                    id: id.into(),
                    secret: "s".into(),
                    domain: "localhost".into(),
                    user_id: "u1".into(),
                })
                .await
                .unwrap();
        }
        h.state.rotate_clients("u1").await.unwrap();
        let live = h.state.clients.get_by_user_id("u1").await.unwrap();
        assert_eq!(live.len(), 1);
        assert!(!live[0].id.starts_with("dup-"));
    }

    #[tokio::test]
    async fn issue_client_requires_session() {
        let h = harness(OAuth2Settings::default());
        assert!(matches!(
            h.state.issue_client(None).await,
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            h.state.issue_client(Some("bogus")).await,
            Err(ApiError::Forbidden)
        ));

        let token = h.state.sessions.create_session("u1").await.unwrap();
        let clients = h.state.issue_client(Some(&token)).await.unwrap();
        assert_eq!(clients[0].user_id, "u1");
    }

    #[tokio::test]
    async fn client_credentials_grant_then_authorize() {
        let h = harness(OAuth2Settings::default());
        let client = h.state.rotate_clients("u1").await.unwrap().remove(0);

        let issued = h
            .state
            .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
            .await
            .unwrap();
        assert_eq!(issued.user_id, "u1");
        assert_eq!(issued.payload.token_type, "Bearer");
        assert_eq!(issued.payload.expires_in, 7200);
        assert!(issued.payload.refresh_token.is_some());
        assert_eq!(h.metrics.get(TOKEN_GENERATIONS, &[]), 1);

        let info = h
            .state
            .authorize(&bearer(&issued.payload.access_token), None)
            .await
            .unwrap();
        assert_eq!(info.client_id, client.id);
        assert_eq!(h.metrics.get(AUTH_SUCCESSES, &[("method", "oauth2")]), 1);
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_client_are_invalid_client() {
        let h = harness(OAuth2Settings::default());
        let client = h.state.rotate_clients("u1").await.unwrap().remove(0);

        let wrong = Some(ClientCredentials {
            id: client.id.clone(),
            secret: "nope".into(),
        });
        let unknown = Some(ClientCredentials {
            id: "unknown".into(),
            secret: client.secret.clone(),
        });
        for c in [wrong, unknown, None] {
            let err = h
                .state
                .issue_token(&Method::POST, c, &grant("client_credentials"))
                .await
                .unwrap_err();
            assert!(matches!(err, GrantError::InvalidClient));
        }
        assert_eq!(h.metrics.get(TOKEN_GENERATIONS, &[]), 0);
    }

    #[tokio::test]
    async fn grant_type_is_checked_before_client() {
        let h = harness(OAuth2Settings::default());
        let err = h
            .state
            .issue_token(&Method::POST, None, &TokenRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::UnsupportedGrantType));

        let err = h
            .state
            .issue_token(&Method::POST, None, &grant("password"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::UnsupportedGrantType));
    }

    #[tokio::test]
    async fn get_requests_follow_config() {
        let h = harness(OAuth2Settings {
            allow_get_access_request: false,
            ..OAuth2Settings::default()
        });
        let client = h.state.rotate_clients("u1").await.unwrap().remove(0);
        let err = h
            .state
            .issue_token(&Method::GET, creds(&client), &grant("client_credentials"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::InvalidRequest(_)));

        assert!(
            h.state
                .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn refresh_rotates_and_consumes() {
        let h = harness(OAuth2Settings::default());
        let client = h.state.rotate_clients("u1").await.unwrap().remove(0);
        let first = h
            .state
            .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
            .await
            .unwrap();

        let mut req = grant("refresh_token");
        req.refresh_token = first.payload.refresh_token.clone();
        let second = h
            .state
            .issue_token(&Method::POST, creds(&client), &req)
            .await
            .unwrap();
        assert_ne!(second.payload.access_token, first.payload.access_token);
        assert_eq!(second.user_id, "u1");

        // the old pair is gone
        assert!(
            h.state
                .authorize(&bearer(&first.payload.access_token), None)
                .await
                .is_err()
        );
        let replay = h
            .state
            .issue_token(&Method::POST, creds(&client), &req)
            .await
            .unwrap_err();
        assert!(matches!(replay, GrantError::InvalidGrant(_)));
    }

    /// Memory store that yields after each refresh lookup so concurrent
    /// grants interleave, and can be told to fail inserts.
    #[derive(Default)]
    struct InterleavingTokens {
        inner: MemoryTokenStore,
        fail_create: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl TokenStore for InterleavingTokens {
        async fn create(&self, token: &TokenInfo) -> Result<(), StorageError> {
            if self.fail_create.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StorageError::Closed);
            }
            self.inner.create(token).await
        }
        async fn get_by_access(&self, access: &str) -> Result<Option<TokenInfo>, StorageError> {
            self.inner.get_by_access(access).await
        }
        async fn get_by_refresh(&self, refresh: &str) -> Result<Option<TokenInfo>, StorageError> {
            let found = self.inner.get_by_refresh(refresh).await;
            tokio::task::yield_now().await;
            found
        }
        async fn remove_by_access(&self, access: &str) -> Result<bool, StorageError> {
            self.inner.remove_by_access(access).await
        }
        async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
            self.inner.delete_expired(now).await
        }
        async fn close(&self) -> Result<(), StorageError> {
            self.inner.close().await
        }
    }

    fn interleaving_state() -> (OAuth2State, Arc<InterleavingTokens>) {
        let tokens = Arc::new(InterleavingTokens::default());
        let state = OAuth2State::new(
            ClientStore::new(Arc::new(MemoryKvStore::new())),
            tokens.clone(),
            SessionManager::new(Arc::new(MemoryAccounts::new()), 3600),
            Arc::new(Recorder::new()),
            OAuth2Settings::default(),
        );
        (state, tokens)
    }

    #[tokio::test]
    async fn concurrent_refreshes_spend_the_token_once() {
        let (state, tokens) = interleaving_state();
        let client = state.rotate_clients("u1").await.unwrap().remove(0);
        let first = state
            .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
            .await
            .unwrap();

        let mut req = grant("refresh_token");
        req.refresh_token = first.payload.refresh_token.clone();
        let (a, b) = tokio::join!(
            state.issue_token(&Method::POST, creds(&client), &req),
            state.issue_token(&Method::POST, creds(&client), &req),
        );

        let (winner, loser) = match (a, b) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
            (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
        };
        assert!(matches!(loser, GrantError::InvalidGrant(_)));

        // only the winner's pair survives
        assert!(
            tokens
                .get_by_access(&winner.payload.access_token)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            tokens
                .get_by_access(&first.payload.access_token)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(tokens.inner.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_old_pair() {
        let (state, tokens) = interleaving_state();
        let client = state.rotate_clients("u1").await.unwrap().remove(0);
        let first = state
            .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
            .await
            .unwrap();

        tokens
            .fail_create
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let mut req = grant("refresh_token");
        req.refresh_token = first.payload.refresh_token.clone();
        let err = state
            .issue_token(&Method::POST, creds(&client), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::Server(_)));

        tokens
            .fail_create
            .store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(
            state
                .authorize(&bearer(&first.payload.access_token), None)
                .await
                .is_ok()
        );
        assert!(state.issue_token(&Method::POST, creds(&client), &req).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_token_bound_to_its_client() {
        let h = harness(OAuth2Settings::default());
        let a = h.state.rotate_clients("u1").await.unwrap().remove(0);
        let b = h.state.rotate_clients("u2").await.unwrap().remove(0);
        let issued = h
            .state
            .issue_token(&Method::POST, creds(&a), &grant("client_credentials"))
            .await
            .unwrap();

        let mut req = grant("refresh_token");
        req.refresh_token = issued.payload.refresh_token;
        let err = h
            .state
            .issue_token(&Method::POST, creds(&b), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::InvalidGrant(_)));

        let missing = h
            .state
            .issue_token(&Method::POST, creds(&b), &grant("refresh_token"))
            .await
            .unwrap_err();
        assert!(matches!(missing, GrantError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn refresh_tokens_can_be_disabled() {
        let h = harness(OAuth2Settings {
            issue_refresh_tokens: false,
            ..OAuth2Settings::default()
        });
        let client = h.state.rotate_clients("u1").await.unwrap().remove(0);
        let issued = h
            .state
            .issue_token(&Method::POST, creds(&client), &grant("client_credentials"))
            .await
            .unwrap();
        assert!(issued.payload.refresh_token.is_none());
    }

    #[tokio::test]
    async fn expired_and_unknown_bearers_fail() {
        let h = harness(OAuth2Settings::default());
        let now = OffsetDateTime::now_utc();
        h.tokens
            .create(&TokenInfo {
                id: "t1".into(),
                access_token: "expired".into(),
                refresh_token: None,
                token_type: TOKEN_TYPE.into(),
                client_id: "c1".into(),
                user_id: "u1".into(),
                scope: String::new(),
                access_token_expires_at: now - Duration::seconds(1),
                refresh_token_expires_at: None,
                created_at: now - Duration::hours(2),
            })
            .await
            .unwrap();

        for headers in [bearer("expired"), bearer("unknown"), HeaderMap::new()] {
            let err = h.state.authorize(&headers, None).await.unwrap_err();
            assert!(matches!(err, GrantError::InvalidToken(_)));
        }
        assert_eq!(h.metrics.get(AUTH_FAILURES, &[("method", "oauth2")]), 3);
    }

    #[tokio::test]
    async fn empty_client_id_is_rejected() {
        let h = harness(OAuth2Settings::default());
        let now = OffsetDateTime::now_utc();
        h.tokens
            .create(&TokenInfo {
                id: "t1".into(),
                access_token: "orphan".into(),
                refresh_token: None,
                token_type: TOKEN_TYPE.into(),
                client_id: String::new(),
                user_id: "u1".into(),
                scope: String::new(),
                access_token_expires_at: now + Duration::hours(1),
                refresh_token_expires_at: None,
                created_at: now,
            })
            .await
            .unwrap();
        assert!(h.state.authorize(&bearer("orphan"), None).await.is_err());
    }

    #[test]
    fn credentials_from_basic_auth_first() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", STANDARD.encode("id:secret"))).unwrap(),
        );
        let req = TokenRequest {
            client_id: Some("form-id".into()),
            client_secret: Some("form-secret".into()),
            ..TokenRequest::default()
        };
        let c = extract_client_credentials(&headers, &req).unwrap();
        assert_eq!((c.id.as_str(), c.secret.as_str()), ("id", "secret"));

        let c = extract_client_credentials(&HeaderMap::new(), &req).unwrap();
        assert_eq!(c.id, "form-id");

        let mut encoded = HeaderMap::new();
        encoded.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", STANDARD.encode("my%3Aid:s+cr%25t"))).unwrap(),
        );
        let c = extract_client_credentials(&encoded, &TokenRequest::default()).unwrap();
        assert_eq!((c.id.as_str(), c.secret.as_str()), ("my:id", "s cr%t"));

        let partial = TokenRequest {
            client_id: Some("form-id".into()),
            ..TokenRequest::default()
        };
        assert!(extract_client_credentials(&HeaderMap::new(), &partial).is_none());
    }

    #[test]
    fn bearer_from_header_or_query() {
        assert_eq!(extract_bearer_token(&bearer("abc"), Some("q")).as_deref(), Some("abc"));
        assert_eq!(extract_bearer_token(&HeaderMap::new(), Some("q")).as_deref(), Some("q"));
        assert_eq!(extract_bearer_token(&HeaderMap::new(), Some("")), None);
    }

    #[tokio::test]
    async fn shutdown_closes_both_stores() {
        let h = harness(OAuth2Settings::default());
        h.state.shutdown().await.unwrap();
        h.state.shutdown().await.unwrap();
        assert!(matches!(
            h.state.rotate_clients("u1").await,
            Err(StorageError::Closed)
        ));
        assert!(matches!(
            h.tokens.get_by_access("x").await,
            Err(StorageError::Closed)
        ));
    }
}
