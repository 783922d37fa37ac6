#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use listkeep_api::auth::jwt::{JwtConfig, TokenIssuer};
use listkeep_api::auth::password::SaltedSha1Hasher;
use listkeep_api::auth::service::AuthService;
use listkeep_api::config::{AuthConfig, ServerConfig};
use listkeep_api::router::build_app_router;
use listkeep_api::state::AppState;
use listkeep_core::types::DbId;
use listkeep_core::user::{NewUser, User};
use listkeep_db::kv::{KvStore, MemoryKv};
use listkeep_db::repositories::{UserStore, UserStoreError};

/// Username/hash lookup over a `Vec`, standing in for Postgres.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, input: &NewUser) -> Result<DbId, UserStoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == input.username) {
            return Err(UserStoreError::UsernameTaken(input.username.clone()));
        }
        let id = users.len() as DbId + 1;
        users.push(User {
            id,
            name: input.name.clone(),
            username: input.username.clone(),
            password_hash: input.password_hash.clone(),
        });
        Ok(id)
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, UserStoreError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.username == username && u.password_hash == password_hash)
            .cloned())
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        Ok(())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 720,
        },
        auth: AuthConfig {
            password_salt: "test-salt".to_string(),
            session_ttl_days: 30,
            max_sessions_per_user: 5,
            backend_timeout_secs: 5,
        },
    }
}

/// Everything a test needs to poke at the service and its stores directly.
pub struct TestHarness {
    pub config: ServerConfig,
    pub kv: Arc<MemoryKv>,
    pub users: Arc<MemoryUserStore>,
    pub auth: Arc<AuthService>,
}

pub fn harness_with(config: ServerConfig) -> TestHarness {
    let kv = Arc::new(MemoryKv::new());
    let users = Arc::new(MemoryUserStore::default());
    let auth = AuthService::new(
        users.clone(),
        kv.clone() as Arc<dyn KvStore>,
        Arc::new(SaltedSha1Hasher::new(config.auth.password_salt.clone())),
        TokenIssuer::new(config.jwt.clone()),
        config.auth.session_policy(),
        config.auth.backend_timeout(),
    );
    TestHarness {
        config,
        kv,
        users,
        auth: Arc::new(auth),
    }
}

pub fn harness() -> TestHarness {
    harness_with(test_config())
}

impl TestHarness {
    /// Full router over this harness's stores, same middleware as production.
    pub fn app(&self) -> Router {
        let state = AppState {
            config: Arc::new(self.config.clone()),
            auth: Arc::clone(&self.auth),
        };
        build_app_router(state, &self.config)
    }

    /// Register `username` with password `secret` and return its id.
    pub async fn register(&self, username: &str) -> DbId {
        self.auth
            .sign_up("Test User", username, "secret")
            .await
            .expect("sign-up should succeed")
    }
}

/// Short pause so consecutive sessions get distinct expiry instants.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::builder().method(Method::GET).uri(uri), Body::empty()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let builder = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"));
    send(app, builder, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    send(app, builder, Body::from(body.to_string())).await
}

/// POST with the refresh cookie set and no body.
pub async fn post_with_cookie(app: Router, uri: &str, refresh_token: &str) -> Response {
    let builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(COOKIE, format!("refreshToken={refresh_token}"));
    send(app, builder, Body::empty()).await
}

async fn send(app: Router, builder: axum::http::request::Builder, body: Body) -> Response {
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
