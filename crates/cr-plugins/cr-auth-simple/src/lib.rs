//! # cr-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Handles password sign-up/sign-in, opaque bearer sessions and
//! session-change notifications.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use cr_core::error::{AppError, Result};
use cr_core::models::{Credentials, Session, SessionEvent};
use cr_core::traits::{AuthProvider, CredentialStore};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;
const TOKEN_BYTES: usize = 32;

/// What we keep per session. The raw token is not stored; lookups go
/// through its salted hash.
#[derive(Debug, Clone)]
struct StoredSession {
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

pub struct SimpleAuthProvider {
    credentials: Arc<dyn CredentialStore>,
    /// Secret salt mixed into session lookup keys
    session_salt: String,
    ttl: Duration,
    sessions: DashMap<String, StoredSession>,
    events: broadcast::Sender<SessionEvent>,
}

impl SimpleAuthProvider {
    /// Accepts a salt string (e.g., from configuration)
    pub fn new(credentials: Arc<dyn CredentialStore>, salt: &str, ttl: std::time::Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            credentials,
            session_salt: salt.to_string(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(7)),
            sessions: DashMap::new(),
            events,
        }
    }

    fn session_key(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.session_salt.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn new_token() -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|e| AppError::Internal(format!("rng failure: {e}")))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Drops every expired session; returns how many were removed.
    /// Raw tokens are not kept, so no per-session event is sent here.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, "expired sessions purged");
        }
        removed
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Emails are matched case-insensitively.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::Internal(format!("rng failure: {e}")))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(e.to_string()))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Verifies a password against a stored Argon2 PHC string.
async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || {
        let parsed_hash = match PasswordHash::new(&hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    })
    .await
    .unwrap_or(false)
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid> {
        let email = normalize_email(email);
        if self.credentials.find_credentials(&email).await?.is_some() {
            return Err(AppError::Conflict(format!("{email} is already registered")));
        }
        let password_hash = hash_password(password.to_string()).await?;
        let user_id = Uuid::now_v7();
        self.credentials
            .insert_credentials(Credentials {
                user_id,
                email,
                password_hash,
            })
            .await?;
        info!(%user_id, "credentials registered");
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let rejected = || AppError::Unauthorized("invalid email or password".into());
        let creds = self
            .credentials
            .find_credentials(&normalize_email(email))
            .await?
            .ok_or_else(rejected)?;
        if !verify_password(password.to_string(), creds.password_hash.clone()).await {
            return Err(rejected());
        }

        let token = Self::new_token()?;
        let expires_at = Utc::now() + self.ttl;
        self.sessions.insert(
            self.session_key(&token),
            StoredSession {
                user_id: creds.user_id,
                email: creds.email.clone(),
                expires_at,
            },
        );
        let session = Session {
            user_id: creds.user_id,
            email: creds.email,
            token,
            expires_at,
        };
        info!(user_id = %session.user_id, "signed in");
        self.notify(SessionEvent::SignedIn { user_id: session.user_id });
        Ok(session)
    }

    async fn session(&self, token: &str) -> Result<Option<Session>> {
        let key = self.session_key(token);
        let stored = match self.sessions.get(&key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        if stored.expires_at <= Utc::now() {
            self.sessions.remove(&key);
            debug!(user_id = %stored.user_id, "session expired");
            self.notify(SessionEvent::Expired { token: token.to_string() });
            return Ok(None);
        }
        Ok(Some(Session {
            user_id: stored.user_id,
            email: stored.email,
            token: token.to_string(),
            expires_at: stored.expires_at,
        }))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        if let Some((_, stored)) = self.sessions.remove(&self.session_key(token)) {
            info!(user_id = %stored.user_id, "signed out");
            self.notify(SessionEvent::SignedOut { token: token.to_string() });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
