//! Router-level tests for the auth gate and admission limiter
//!
//! Property: requests to protected endpoints without a valid bearer token
//! are rejected with 401, and role checks only ever answer 403 once
//! identity is established.

#[cfg(test)]
mod tests {
    use crate::auth::{TokenService, TokenTtl};
    use crate::config::AppConfig;
    use crate::routes::create_router;
    use crate::state::AppState;
    use crate::store::{CredentialStore, MemoryCredentialStore, NewUser};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use mahiberawi_shared::Role;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Harness {
        state: AppState,
        store: Arc<MemoryCredentialStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(AppConfig::default())
        }

        fn with_config(config: AppConfig) -> Self {
            let store = Arc::new(MemoryCredentialStore::new());
            let state = AppState::new(store.clone(), config).unwrap();
            Self { state, store }
        }

        fn app(&self) -> Router {
            create_router(self.state.clone())
        }

        async fn user(&self, role: Role) -> (Uuid, String) {
            let user = self
                .store
                .create(NewUser {
                    email: format!("{}@example.com", Uuid::new_v4()),
                    full_name: "Test User".to_string(),
                    password_hash: "unused".to_string(),
                    role,
                })
                .await
                .unwrap();
            let token = self
                .state
                .tokens()
                .issue_access_token(user.id, role)
                .unwrap()
                .token;
            (user.id, token)
        }

        async fn send(&self, request: Request<Body>) -> axum::response::Response {
            self.app().oneshot(request).await.unwrap()
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).method("GET");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn patch_role(uri: &str, token: &str, role: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("PATCH")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"role":"{}"}}"#, role)))
            .unwrap()
    }

    /// Generate random invalid tokens
    fn invalid_token_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("".to_string()),
            // Not a JWT
            "[a-zA-Z0-9]{10,50}",
            // Wrong number of segments
            "[a-zA-Z0-9]{10}\\.[a-zA-Z0-9]{10}",
            // Right shape, bogus signature
            "[a-zA-Z0-9_-]{20}\\.[a-zA-Z0-9_-]{20}\\.[a-zA-Z0-9_-]{20}",
        ]
    }

    /// Generate random authorization header formats
    fn auth_header_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            invalid_token_strategy().prop_map(Some),
            invalid_token_strategy().prop_map(|t| Some(format!("Basic {}", t))),
            invalid_token_strategy().prop_map(|t| Some(format!("Bearer {}", t))),
        ]
    }

    fn protected_path_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("/api/auth/me".to_string()),
            Just("/api/users/profile".to_string()),
            Just(format!("/api/admin/users/{}", Uuid::nil())),
            Just("/api/admin/users".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_unauthenticated_requests_return_401(
            auth_header in auth_header_strategy(),
            path in protected_path_strategy(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let harness = Harness::new();

                let mut request_builder = Request::builder().uri(path.as_str()).method("GET");
                if let Some(header) = auth_header {
                    request_builder = request_builder.header("Authorization", header);
                }

                let request = request_builder.body(Body::empty()).unwrap();
                let response = harness.send(request).await;

                prop_assert_eq!(
                    response.status(),
                    StatusCode::UNAUTHORIZED,
                    "Expected 401 for unauthenticated request"
                );

                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn test_token_with_wrong_secret_returns_401() {
        let harness = Harness::new();
        let (id, _) = harness.user(Role::Member).await;

        let forged = TokenService::new(
            "wrong-secret-key",
            None,
            TokenTtl {
                access_secs: 3600,
                refresh_secs: 3600,
            },
        )
        .issue_access_token(id, Role::SuperAdmin)
        .unwrap();

        let response = harness
            .send(get("/api/users/profile", Some(&forged.token)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let harness = Harness::new();
        let (id, _) = harness.user(Role::Member).await;
        let refresh = harness.state.tokens().issue_refresh_token(id).unwrap();

        let response = harness
            .send(get("/api/users/profile", Some(&refresh.token)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_for_deleted_account_returns_401() {
        let harness = Harness::new();
        let (id, token) = harness.user(Role::Member).await;
        harness.store.remove(id);

        let response = harness.send(get("/api/auth/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_member_reaches_profile_but_not_admin() {
        let harness = Harness::new();
        let (id, token) = harness.user(Role::Member).await;

        let profile = harness.send(get("/api/users/profile", Some(&token))).await;
        assert_eq!(profile.status(), StatusCode::OK);

        let admin = harness
            .send(get(&format!("/api/admin/users/{}", id), Some(&token)))
            .await;
        assert_eq!(admin.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_reads_accounts_but_cannot_change_roles() {
        let harness = Harness::new();
        let (member, _) = harness.user(Role::Member).await;
        let (_, admin) = harness.user(Role::Admin).await;

        let read = harness
            .send(get(&format!("/api/admin/users/{}", member), Some(&admin)))
            .await;
        assert_eq!(read.status(), StatusCode::OK);

        let write = harness
            .send(patch_role(
                &format!("/api/admin/users/{}/role", member),
                &admin,
                "admin",
            ))
            .await;
        assert_eq!(write.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_super_admin_changes_roles() {
        let harness = Harness::new();
        let (member, _) = harness.user(Role::Member).await;
        let (_, root) = harness.user(Role::SuperAdmin).await;

        let response = harness
            .send(patch_role(
                &format!("/api/admin/users/{}/role", member),
                &root,
                "admin",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = harness.store.find_by_id(member).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_unknown_role_in_body_is_rejected() {
        let harness = Harness::new();
        let (member, _) = harness.user(Role::Member).await;
        let (_, root) = harness.user(Role::SuperAdmin).await;

        let response = harness
            .send(patch_role(
                &format!("/api/admin/users/{}/role", member),
                &root,
                "owner",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_route_with_bad_id_is_validation_error() {
        let harness = Harness::new();
        let (_, admin) = harness.user(Role::Admin).await;

        let response = harness
            .send(get("/api/admin/users/not-a-uuid", Some(&admin)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len());
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_only_super_admin_lists_accounts() {
        let harness = Harness::new();
        let (_, member) = harness.user(Role::Member).await;
        let (_, admin) = harness.user(Role::Admin).await;
        let (_, root) = harness.user(Role::SuperAdmin).await;

        for token in [&member, &admin] {
            let response = harness.send(get("/api/admin/users", Some(token))).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        let response = harness
            .send(get("/api/admin/users?limit=2", Some(&root)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(page["users"].as_array().unwrap().len(), 2);
        assert_eq!(page["limit"], 2);
        assert!(page["users"][0].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_list_accounts_rejects_bad_paging() {
        let harness = Harness::new();
        let (_, root) = harness.user(Role::SuperAdmin).await;

        let response = harness
            .send(get("/api/admin/users?limit=1000", Some(&root)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_logout_needs_identity() {
        let harness = Harness::new();
        let (_, token) = harness.user(Role::Member).await;

        let anonymous = harness.send(post_json("/api/auth/logout", None, "")).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let response = harness
            .send(post_json("/api/auth/logout", Some(&token), ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_garbage_token() {
        let harness = Harness::new();
        let response = harness
            .send(post_json("/api/auth/verify-email", None, r#"{"token":"nope"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_access_token() {
        let harness = Harness::new();
        let (_, token) = harness.user(Role::Member).await;
        let body = format!(r#"{{"token":"{}"}}"#, token);
        let response = harness
            .send(post_json("/api/auth/verify-email", None, &body))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_resend_verification_is_uniform() {
        let harness = Harness::new();
        let response = harness
            .send(post_json(
                "/api/auth/resend-verification",
                None,
                r#"{"email":"ghost@example.com"}"#,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let harness = Harness::new();
        let padding = "a".repeat(crate::routes::MAX_REQUEST_BODY_BYTES);
        let body = format!(r#"{{"email":"a@example.com","password":"{}"}}"#, padding);

        let response = harness.send(post_json("/api/auth/login", None, &body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    fn tight_limits(max_requests: u32) -> AppConfig {
        let mut config = AppConfig::default();
        config.rate_limit.max_requests = max_requests;
        config
    }

    #[tokio::test]
    async fn test_limiter_rejects_before_gate() {
        let harness = Harness::with_config(tight_limits(2));

        for _ in 0..2 {
            let response = harness.send(get("/api/auth/me", None)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = harness.send(get("/api/auth/me", None)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response
            .headers()
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=900).contains(&retry_after));
    }

    #[tokio::test]
    async fn test_health_is_not_rate_limited() {
        let harness = Harness::with_config(tight_limits(1));

        for _ in 0..5 {
            let response = harness.send(get("/health", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(harness.state.limiter().windows().is_empty());
    }

    #[tokio::test]
    async fn test_admitted_responses_carry_rate_limit_headers() {
        let harness = Harness::with_config(tight_limits(10));
        let (_, token) = harness.user(Role::Member).await;

        let response = harness.send(get("/api/users/profile", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "10");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "9");
    }
}
