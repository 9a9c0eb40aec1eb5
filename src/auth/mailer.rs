use async_trait::async_trait;
use tracing::info;

use crate::users::User;

/// Delivers a freshly minted reset token to its owner.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset(&self, user: &User, token: &str) -> anyhow::Result<()>;
}

/// Stand-in until a notification service is wired: records that a token was
/// issued without ever writing the token itself.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset(&self, user: &User, token: &str) -> anyhow::Result<()> {
        info!(
            user_id = %user.user_id,
            token_len = token.len(),
            "password reset token issued"
        );
        Ok(())
    }
}
