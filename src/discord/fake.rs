//! In-memory `Platform` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::discord::Platform;
use crate::discord::types::{
    ChannelKind, DiscordChannel, InteractionReply, Mask, User, Webhook, WebhookMessage,
};
use crate::error::ChannelError;

/// Arguments of one `create_webhook` call.
#[derive(Debug, Clone)]
pub struct CreatedWebhook {
    pub channel_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub reason: String,
}

/// A message posted through a mask.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub webhook_id: String,
    pub token: String,
    pub message: WebhookMessage,
}

#[derive(Default)]
pub struct FakePlatform {
    channels: Mutex<HashMap<String, ChannelKind>>,
    webhooks: Mutex<HashMap<String, Vec<Webhook>>>,
    created: Mutex<Vec<CreatedWebhook>>,
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<(String, String)>>,
    replies: Mutex<Vec<(String, InteractionReply)>>,
    fetches: AtomicUsize,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    fail_send: AtomicBool,
    unknown_webhook: AtomicBool,
    fail_delete: AtomicBool,
    latency: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler inside every call so concurrent callers interleave.
    pub fn with_latency(mut self) -> Self {
        self.latency = true;
        self
    }

    pub fn bot_user() -> User {
        User {
            id: "1000".into(),
            username: "proxy-bot".into(),
            avatar: Some("abcdef".into()),
            bot: true,
        }
    }

    pub fn add_channel(&self, id: &str, kind: ChannelKind) {
        self.channels.lock().unwrap().insert(id.into(), kind);
    }

    pub fn add_existing_webhook(&self, channel_id: &str, id: &str, name: &str, owner_id: &str) {
        let webhook = Webhook {
            id: id.into(),
            name: Some(name.into()),
            token: Some(format!("token-{id}")),
            user: Some(User {
                id: owner_id.into(),
                username: String::new(),
                avatar: None,
                bot: true,
            }),
            channel_id: Some(channel_id.into()),
        };
        self.webhooks
            .lock()
            .unwrap()
            .entry(channel_id.into())
            .or_default()
            .push(webhook);
    }

    pub fn fail_create_webhook(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make sends fail as if the webhook had been deleted remotely.
    pub fn webhook_gone(&self, gone: bool) {
        self.unknown_webhook.store(gone, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn webhooks_created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn created_webhooks(&self) -> Vec<CreatedWebhook> {
        self.created.lock().unwrap().clone()
    }

    pub fn channel_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(String, InteractionReply)> {
        self.replies.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if self.latency {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn current_user(&self) -> Result<User, ChannelError> {
        Ok(Self::bot_user())
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<DiscordChannel, ChannelError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let kind = *self
            .channels
            .lock()
            .unwrap()
            .get(channel_id)
            .ok_or_else(|| ChannelError::ChannelNotFound(channel_id.into()))?;
        Ok(DiscordChannel {
            id: channel_id.into(),
            kind,
            guild_id: Some("guild".into()),
        })
    }

    async fn list_webhooks(&self, channel_id: &str) -> Result<Vec<Webhook>, ChannelError> {
        self.pause().await;
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        reason: &str,
    ) -> Result<Webhook, ChannelError> {
        self.pause().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ChannelError::Api {
                route: format!("/channels/{channel_id}/webhooks"),
                status: 403,
                body: "Missing Permissions".into(),
            });
        }
        self.created.lock().unwrap().push(CreatedWebhook {
            channel_id: channel_id.into(),
            name: name.into(),
            avatar_url: avatar_url.map(String::from),
            reason: reason.into(),
        });

        let id = format!("wh-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.add_existing_webhook(channel_id, &id, name, &Self::bot_user().id);
        let created = self.webhooks.lock().unwrap()[channel_id]
            .last()
            .cloned()
            .ok_or_else(|| ChannelError::InvalidPayload("webhook vanished".into()))?;
        Ok(created)
    }

    async fn execute_webhook(
        &self,
        mask: &Mask,
        message: &WebhookMessage,
    ) -> Result<(), ChannelError> {
        self.pause().await;
        if self.unknown_webhook.load(Ordering::SeqCst) {
            return Err(ChannelError::UnknownWebhook(mask.id.clone()));
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed {
                webhook_id: mask.id.clone(),
                reason: "500 Internal Server Error".into(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            webhook_id: mask.id.clone(),
            token: mask.token.expose_secret().to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), ChannelError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ChannelError::Api {
                route: format!("/channels/{channel_id}/messages/{message_id}"),
                status: 403,
                body: "Missing Permissions".into(),
            });
        }
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id.into(), message_id.into()));
        Ok(())
    }

    async fn register_commands(
        &self,
        _application_id: &str,
        _commands: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn respond_to_interaction(
        &self,
        interaction_id: &str,
        _interaction_token: &str,
        reply: &InteractionReply,
    ) -> Result<(), ChannelError> {
        self.replies
            .lock()
            .unwrap()
            .push((interaction_id.into(), reply.clone()));
        Ok(())
    }
}
