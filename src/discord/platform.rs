//! `Platform` trait: every outbound call the bot makes to Discord.

use async_trait::async_trait;

use crate::discord::types::{
    DiscordChannel, InteractionReply, Mask, User, Webhook, WebhookMessage,
};
use crate::error::ChannelError;

/// Outbound Discord operations used by the proxy and command paths.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own account.
    async fn current_user(&self) -> Result<User, ChannelError>;

    async fn fetch_channel(&self, channel_id: &str) -> Result<DiscordChannel, ChannelError>;

    /// Webhooks that already exist in a channel.
    async fn list_webhooks(&self, channel_id: &str) -> Result<Vec<Webhook>, ChannelError>;

    /// Create a webhook. `avatar_url` is fetched and uploaded as the webhook avatar.
    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        reason: &str,
    ) -> Result<Webhook, ChannelError>;

    /// Post a message through a mask.
    async fn execute_webhook(
        &self,
        mask: &Mask,
        message: &WebhookMessage,
    ) -> Result<(), ChannelError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str)
    -> Result<(), ChannelError>;

    /// Overwrite the application's global slash commands.
    async fn register_commands(
        &self,
        application_id: &str,
        commands: &serde_json::Value,
    ) -> Result<(), ChannelError>;

    async fn respond_to_interaction(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        reply: &InteractionReply,
    ) -> Result<(), ChannelError>;
}
