//! Shared fixture for the HTTP tests: the full router over in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;

use auth_server::{
    AppResources,
    accounts::{AccountsState, sql::SqlAccounts},
    api::build_router,
    config::AppConfig,
    metrics::Recorder,
    oauth2::{OAuth2Settings, OAuth2State, clients::ClientStore, tokens::MemoryTokenStore},
    storage::{DbHandle, kv::MemoryKvStore},
};
use axum::http::{HeaderValue, header};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use migration::AccountsMigrator;
use serde_json::{Value, json};

pub const EMAIL: &str = "john.doe@example.com";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub server: TestServer,
    pub metrics: Arc<Recorder>,
    pub accounts_db: DbHandle,
    pub oauth2: OAuth2State,
}

pub async fn test_app() -> TestApp {
    test_app_with(OAuth2Settings::default()).await
}

pub async fn test_app_with(settings: OAuth2Settings) -> TestApp {
    let config = AppConfig::default();
    let metrics = Arc::new(Recorder::new());

    let accounts_db = DbHandle::open::<AccountsMigrator>("sqlite::memory:")
        .await
        .expect("open accounts db");
    let accounts = AccountsState::new(
        Arc::new(SqlAccounts::new(accounts_db.clone())),
        metrics.clone(),
        &config.session,
    );
    let oauth2 = OAuth2State::new(
        ClientStore::new(Arc::new(MemoryKvStore::new())),
        Arc::new(MemoryTokenStore::new()),
        accounts.sessions.clone(),
        metrics.clone(),
        settings,
    );

    let resources = AppResources {
        config: Arc::new(config),
        metrics: metrics.clone(),
    };
    let router = build_router(resources, accounts, oauth2.clone());

    TestApp {
        server: TestServer::new(router).expect("create test server"),
        metrics,
        accounts_db,
        oauth2,
    }
}

pub fn basic_auth(id: &str, secret: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{id}:{secret}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value")
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("header value")
}

pub fn cookie(session: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("auth_session={session}")).expect("header value")
}

impl TestApp {
    pub async fn signup(&self, email: &str, password: &str) -> Value {
        let response = self
            .server
            .post("/users/create")
            .json(&json!({
                "email": email,
                "password": password,
                "firstName": "John",
                "lastName": "Doe",
                "phone": "+1 (555) 555-1234",
            }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()
    }

    /// Log in and return the raw session token from `Set-Cookie`.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .server
            .post("/users/login")
            .json(&json!({ "email": email, "password": password }))
            .await;
        response.assert_status_ok();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie header")
            .to_string();
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix("auth_session="))
            .expect("auth_session cookie")
            .to_string()
    }

    /// Rotate the session user's client, returning `(client_id, client_secret)`.
    pub async fn create_client(&self, session: &str) -> (String, String) {
        let response = self
            .server
            .post("/oauth2/token/create")
            .add_header(header::COOKIE, cookie(session))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        let clients = body["clients"].as_array().expect("clients array");
        assert_eq!(clients.len(), 1);
        (
            clients[0]["id"].as_str().expect("id").to_string(),
            clients[0]["secret"].as_str().expect("secret").to_string(),
        )
    }

    /// Signup, login and client creation in one go.
    pub async fn registered_client(&self) -> (String, String, String) {
        let user = self.signup(EMAIL, PASSWORD).await;
        let session = self.login(EMAIL, PASSWORD).await;
        let (id, secret) = self.create_client(&session).await;
        (user["id"].as_str().expect("user id").to_string(), id, secret)
    }
}
