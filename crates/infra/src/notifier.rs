//! Delivery of activation links.
//!
//! E-mail delivery lives outside this service; the notifiers here either log
//! the event or keep it in memory.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use usersvc_auth::User;
use usersvc_core::UserId;

/// What a notifier is asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationMessage {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ActivationMessage {
    pub fn for_user(user: &User, token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            token: token.to_string(),
            expires_at,
        }
    }
}

#[async_trait::async_trait]
pub trait ActivationNotifier: Send + Sync {
    async fn send_activation(&self, message: ActivationMessage) -> anyhow::Result<()>;
}

/// Logs deliveries. The token itself is only logged when `reveal_tokens` is
/// set, which is meant for local development without a mail relay.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier {
    reveal_tokens: bool,
}

impl LogNotifier {
    pub fn new(reveal_tokens: bool) -> Self {
        Self { reveal_tokens }
    }
}

#[async_trait::async_trait]
impl ActivationNotifier for LogNotifier {
    async fn send_activation(&self, message: ActivationMessage) -> anyhow::Result<()> {
        if self.reveal_tokens {
            tracing::info!(
                user_id = %message.user_id,
                email = %message.email,
                expires_at = %message.expires_at,
                activation_token = %message.token,
                "activation link issued"
            );
        } else {
            tracing::info!(
                user_id = %message.user_id,
                email = %message.email,
                expires_at = %message.expires_at,
                "activation link issued"
            );
        }
        Ok(())
    }
}

/// Keeps every delivery in memory so tests can pick up tokens.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<ActivationMessage>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ActivationMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Most recent token sent to `email`.
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|m| m.email == email)
            .map(|m| m.token)
    }
}

#[async_trait::async_trait]
impl ActivationNotifier for OutboxNotifier {
    async fn send_activation(&self, message: ActivationMessage) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?
            .push(message);
        Ok(())
    }
}
