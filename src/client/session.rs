//! Session state
//!
//! The session is owned by the host application. The engine only reads it
//! through a `watch` receiver and reacts to its changes.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
}

impl SessionState {
    /// A signed-in user
    pub fn authenticated(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            user_id: Some(user_id.into()),
        }
    }

    /// A user known locally but without a token yet
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self {
            access_token: None,
            user_id: Some(user_id.into()),
        }
    }

    /// No access token
    pub fn is_anonymous(&self) -> bool {
        self.access_token.is_none()
    }
}

/// Create the channel through which the host publishes session changes
pub fn session_channel(
    initial: SessionState,
) -> (watch::Sender<SessionState>, watch::Receiver<SessionState>) {
    watch::channel(initial)
}
