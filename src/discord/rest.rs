//! Discord REST client: HTTP API v10 over reqwest.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::discord::Platform;
use crate::discord::types::{
    DiscordChannel, InteractionReply, Mask, User, Webhook, WebhookMessage,
};
use crate::error::ChannelError;

/// Default API root.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Webhook usernames are capped at 80 characters.
const MAX_WEBHOOK_USERNAME: usize = 80;

/// Interaction callback type: respond with a message.
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;

/// Message flag: only the invoker sees the reply.
const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Header carrying the audit-log reason for moderation actions.
const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";

/// Discord HTTP API client authenticated as the bot.
pub struct DiscordRest {
    token: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl DiscordRest {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            base_url: DISCORD_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    /// Turn a non-2xx response into an `Api` error carrying the body.
    async fn check(resp: Response, route: &str) -> Result<Response, ChannelError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChannelError::Api {
            route: route.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, ChannelError> {
        let resp = self
            .client
            .get(self.api_url(route))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        Ok(Self::check(resp, route).await?.json().await?)
    }

    /// Download a file the bot needs to re-upload.
    async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ChannelError> {
        let resp = self.client.get(url).send().await?;
        let resp = Self::check(resp, url).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = resp.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Fetch an image and encode it as the data URI the webhook API expects.
    async fn avatar_data_uri(&self, url: &str) -> Result<String, ChannelError> {
        let (bytes, content_type) = self.download(url).await?;
        Ok(image_data_uri(&bytes, content_type.as_deref()))
    }

    async fn build_multipart(
        &self,
        message: &WebhookMessage,
    ) -> Result<Form, ChannelError> {
        let payload = webhook_payload(message);
        let mut form = Form::new().text("payload_json", payload.to_string());

        for (i, attachment) in message.attachments.iter().enumerate() {
            let (bytes, fetched_type) = self.download(&attachment.url).await?;
            let mut part = Part::bytes(bytes).file_name(attachment.filename.clone());
            if let Some(mime) = attachment.content_type.as_deref().or(fetched_type.as_deref()) {
                part = part.mime_str(mime)?;
            }
            form = form.part(format!("files[{i}]"), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Platform for DiscordRest {
    async fn current_user(&self) -> Result<User, ChannelError> {
        self.get_json("/users/@me").await
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<DiscordChannel, ChannelError> {
        match self.get_json(&format!("/channels/{channel_id}")).await {
            Err(ChannelError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(ChannelError::ChannelNotFound(channel_id.to_string()))
            }
            other => other,
        }
    }

    async fn list_webhooks(&self, channel_id: &str) -> Result<Vec<Webhook>, ChannelError> {
        self.get_json(&format!("/channels/{channel_id}/webhooks"))
            .await
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        reason: &str,
    ) -> Result<Webhook, ChannelError> {
        let avatar = match avatar_url {
            Some(url) => match self.avatar_data_uri(url).await {
                Ok(uri) => Some(uri),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not fetch webhook avatar; creating without one");
                    None
                }
            },
            None => None,
        };

        let route = format!("/channels/{channel_id}/webhooks");
        let body = serde_json::json!({ "name": name, "avatar": avatar });
        let resp = self
            .client
            .post(self.api_url(&route))
            .header(AUTHORIZATION, self.auth())
            .header(AUDIT_LOG_REASON, reason)
            .json(&body)
            .send()
            .await?;

        let webhook: Webhook = Self::check(resp, &route).await?.json().await?;
        tracing::info!(channel_id, webhook_id = %webhook.id, "Created webhook");
        Ok(webhook)
    }

    async fn execute_webhook(
        &self,
        mask: &Mask,
        message: &WebhookMessage,
    ) -> Result<(), ChannelError> {
        let route = format!("/webhooks/{}/{}", mask.id, mask.token.expose_secret());
        let url = format!("{}?wait=true", self.api_url(&route));

        let request = if message.attachments.is_empty() {
            self.client.post(&url).json(&webhook_payload(message))
        } else {
            self.client.post(&url).multipart(self.build_multipart(message).await?)
        };

        let resp = request.send().await.map_err(|e| ChannelError::SendFailed {
            webhook_id: mask.id.clone(),
            reason: e.without_url().to_string(),
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ChannelError::UnknownWebhook(mask.id.clone()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                webhook_id: mask.id.clone(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), ChannelError> {
        let route = format!("/channels/{channel_id}/messages/{message_id}");
        let resp = self
            .client
            .delete(self.api_url(&route))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        Self::check(resp, &route).await?;
        Ok(())
    }

    async fn register_commands(
        &self,
        application_id: &str,
        commands: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let route = format!("/applications/{application_id}/commands");
        let resp = self
            .client
            .put(self.api_url(&route))
            .header(AUTHORIZATION, self.auth())
            .json(commands)
            .send()
            .await?;
        Self::check(resp, &route).await?;
        Ok(())
    }

    async fn respond_to_interaction(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        reply: &InteractionReply,
    ) -> Result<(), ChannelError> {
        let route = format!("/interactions/{interaction_id}/{interaction_token}/callback");
        let resp = self
            .client
            .post(self.api_url(&route))
            .json(&interaction_callback(reply))
            .send()
            .await?;
        Self::check(resp, &format!("/interactions/{interaction_id}/callback")).await?;
        Ok(())
    }
}

// ── Payload builders ────────────────────────────────────────────────

/// JSON body for executing a webhook. Attachment descriptors are indexed to
/// match the `files[n]` multipart parts.
pub fn webhook_payload(message: &WebhookMessage) -> serde_json::Value {
    let username: String = message.username.chars().take(MAX_WEBHOOK_USERNAME).collect();
    let mut body = serde_json::json!({
        "content": message.content,
        "username": username,
        "allowed_mentions": message.allowed_mentions,
    });

    if let Some(avatar) = &message.avatar_url {
        body["avatar_url"] = serde_json::Value::String(avatar.clone());
    }
    if !message.embeds.is_empty() {
        body["embeds"] = serde_json::json!(message.embeds);
    }
    if !message.attachments.is_empty() {
        body["attachments"] = message
            .attachments
            .iter()
            .enumerate()
            .map(|(i, a)| serde_json::json!({ "id": i, "filename": a.filename }))
            .collect();
    }
    body
}

/// JSON body for an interaction callback.
pub fn interaction_callback(reply: &InteractionReply) -> serde_json::Value {
    let mut data = serde_json::json!({});
    if let Some(content) = &reply.content {
        data["content"] = serde_json::Value::String(content.clone());
    }
    if !reply.embeds.is_empty() {
        data["embeds"] = serde_json::json!(reply.embeds);
    }
    if reply.ephemeral {
        data["flags"] = serde_json::json!(FLAG_EPHEMERAL);
    }
    serde_json::json!({ "type": CALLBACK_CHANNEL_MESSAGE, "data": data })
}

/// Encode raw image bytes as a `data:` URI.
pub fn image_data_uri(bytes: &[u8], content_type: Option<&str>) -> String {
    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or("image/png");
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

// ── Tests ───────────────────────────────────────────────────────────
