//! # SessionContext
//!
//! The single place the current user's session lives. It is established at
//! sign-in, cleared at sign-out, and cleared when the AuthProvider reports
//! the session expired. Sign-ins seen on the shared event channel are never
//! adopted; only `establish` sets the current session.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{Session, SessionEvent};

#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&self, session: Session) {
        info!(user_id = %session.user_id, "session established");
        *self.write() = Some(session);
    }

    pub fn clear(&self) {
        if self.write().take().is_some() {
            info!("session cleared");
        }
    }

    /// The live session, if any. An expired session is dropped on read.
    pub fn current(&self) -> Option<Session> {
        let session = self.read().clone()?;
        if session.is_expired_at(Utc::now()) {
            debug!(user_id = %session.user_id, "session expired locally");
            self.clear();
            return None;
        }
        Some(session)
    }

    /// Like [`current`](Self::current), but a missing session is an
    /// authorization error the caller can surface as a sign-in prompt.
    pub fn require(&self) -> Result<Session> {
        self.current()
            .ok_or_else(|| AppError::Unauthorized("please sign in first".into()))
    }

    pub fn apply_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SignedIn { user_id } => {
                debug!(%user_id, "sign-in observed");
            }
            SessionEvent::SignedOut { token } | SessionEvent::Expired { token } => {
                let ours = self.read().as_ref().is_some_and(|s| &s.token == token);
                if ours {
                    self.clear();
                }
            }
        }
    }

    /// Follows session-change notifications until the channel closes.
    pub fn watch(&self, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let ctx = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => ctx.apply_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
