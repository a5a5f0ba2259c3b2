//! Application state management
//!
//! Shared resources handed to every handler and middleware through axum's
//! state extraction. Everything is built once at startup and is read-only
//! afterwards; cloning only bumps reference counts.

use crate::auth::{AuthGate, ResetTokenService, TokenService, TokenTtl, VerificationTokenService};
use crate::config::AppConfig;
use crate::limiter::AdmissionLimiter;
use crate::notify::{AccountNotifier, LogNotifier, WebhookNotifier};
use crate::store::{CredentialStore, SharedStore};
use anyhow::{bail, Result};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    config: Arc<AppConfig>,
    /// Pre-computed signing keys
    tokens: TokenService,
    resets: ResetTokenService,
    verifications: VerificationTokenService,
    limiter: AdmissionLimiter,
    notifier: Arc<dyn AccountNotifier>,
}

impl AppState {
    /// Build the state from configuration
    ///
    /// Signing keys are derived here, once. Token deliveries go to the
    /// configured webhook, or to the log when none is set. Fails when a
    /// token lifetime is out of range, in every environment.
    pub fn new(store: SharedStore, config: AppConfig) -> Result<Self> {
        let lifetime_errors = config.jwt.lifetime_errors();
        if !lifetime_errors.is_empty() {
            bail!("Invalid token lifetimes: {}", lifetime_errors.join("; "));
        }

        let tokens = TokenService::new(
            &config.jwt.secret,
            config.jwt.refresh_secret.as_deref(),
            TokenTtl {
                access_secs: config.jwt.access_token_expiry_secs,
                refresh_secs: config.jwt.refresh_token_expiry_secs,
            },
        );
        let resets = ResetTokenService::new(&config.jwt.secret, config.jwt.reset_token_expiry_secs);
        let verifications = VerificationTokenService::new(
            &config.jwt.secret,
            config.jwt.verification_token_expiry_secs,
        );
        let limiter = AdmissionLimiter::from_config(&config.rate_limit);
        let notifier: Arc<dyn AccountNotifier> = match &config.notifier.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.as_str())?),
            None => Arc::new(LogNotifier),
        };

        Ok(Self {
            store,
            config: Arc::new(config),
            tokens,
            resets,
            verifications,
            limiter,
            notifier,
        })
    }

    /// Replace the token notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn AccountNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the admission limiter (e.g. one driven by a manual clock)
    pub fn with_limiter(mut self, limiter: AdmissionLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[inline]
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[inline]
    pub fn resets(&self) -> &ResetTokenService {
        &self.resets
    }

    #[inline]
    pub fn verifications(&self) -> &VerificationTokenService {
        &self.verifications
    }

    #[inline]
    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    pub fn notifier(&self) -> Arc<dyn AccountNotifier> {
        Arc::clone(&self.notifier)
    }

    /// Auth gate bound to this state's keys, store and role policy
    pub fn gate(&self) -> AuthGate<'_> {
        AuthGate::new(
            &self.tokens,
            self.store.as_ref(),
            self.config.auth.role_policy,
        )
    }
}
