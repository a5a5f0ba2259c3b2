//! Common test utilities for integration tests
//!
//! `TestApp` drives the full router over the in-memory credential store.
//! Token deliveries are captured instead of sent, and the admission
//! limiter runs on a manual clock.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use mahiberawi_backend::{
    config::AppConfig,
    limiter::{AdmissionLimiter, Clock, ManualClock, RateWindowStore},
    notify::{AccountNotifier, Delivery, Purpose},
    routes,
    state::AppState,
    store::MemoryCredentialStore,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Notifier that keeps deliveries for inspection
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Delivery>>,
}

#[async_trait]
impl AccountNotifier for Outbox {
    async fn send(&self, delivery: Delivery) -> anyhow::Result<()> {
        self.sent.lock().push(delivery);
        Ok(())
    }
}

impl Outbox {
    /// Deliveries with `purpose`, oldest first
    pub fn sent(&self, purpose: Purpose) -> Vec<Delivery> {
        self.sent
            .lock()
            .iter()
            .filter(|d| d.purpose == purpose)
            .cloned()
            .collect()
    }

    /// Wait for detached delivery tasks to hand over `n` deliveries
    pub async fn wait_for(&self, purpose: Purpose, n: usize) -> Vec<Delivery> {
        for _ in 0..100 {
            if self.sent(purpose).len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent(purpose)
    }
}

/// Response captured by [`TestApp`]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
    pub outbox: Arc<Outbox>,
    pub clock: Arc<ManualClock>,
    peer: Mutex<SocketAddr>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let outbox = Arc::new(Outbox::default());
        let clock = Arc::new(ManualClock::new());

        let limiter = AdmissionLimiter::new(
            &config.rate_limit,
            Arc::new(RateWindowStore::new(clock.now())),
            clock.clone(),
        );
        let state = AppState::new(store.clone(), config)
            .unwrap()
            .with_notifier(outbox.clone())
            .with_limiter(limiter);
        let app = routes::create_router(state.clone());

        Self {
            app,
            state,
            store,
            outbox,
            clock,
            peer: Mutex::new("198.51.100.10:40000".parse().unwrap()),
        }
    }

    /// Send subsequent requests from `addr`
    pub fn from_peer(&self, addr: &str) {
        *self.peer.lock() = addr.parse().unwrap();
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    /// Send a prepared request from the current peer address
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        let peer = *self.peer.lock();
        request.extensions_mut().insert(ConnectInfo(peer));

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body), None).await
    }

    pub async fn post_with_token(&self, path: &str, body: Value, token: &str) -> TestResponse {
        self.request(Method::POST, path, Some(body), Some(token)).await
    }

    pub async fn patch(&self, path: &str, body: Value, token: &str) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), Some(token)).await
    }

    /// Register an account and return the `AuthResponse` body
    pub async fn register(&self, email: &str, password: &str) -> Value {
        let response = self
            .post(
                "/api/auth/register",
                json!({ "email": email, "password": password, "fullName": "Test User" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.json()
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = "test-secret-key-for-testing-only-32chars".to_string();
    config
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}
