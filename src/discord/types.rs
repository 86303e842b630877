//! Discord API types: the subset of the v10 object model the bot touches.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Discord's epoch offset is encoded in the top bits of snowflakes.
const SNOWFLAKE_TIMESTAMP_SHIFT: u32 = 22;

/// Number of built-in default avatars.
const DEFAULT_AVATAR_COUNT: u64 = 6;

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// A Discord user (or bot account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    /// Avatar hash, not a URL.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// CDN URL of the user's avatar, falling back to the default avatar.
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => {
                let ext = if hash.starts_with("a_") { "gif" } else { "png" };
                format!("{CDN_BASE}/avatars/{}/{hash}.{ext}", self.id)
            }
            None => {
                let index = self
                    .id
                    .parse::<u64>()
                    .map(|id| (id >> SNOWFLAKE_TIMESTAMP_SHIFT) % DEFAULT_AVATAR_COUNT)
                    .unwrap_or(0);
                format!("{CDN_BASE}/embed/avatars/{index}.png")
            }
        }
    }
}

/// Channel types, as far as the bot cares about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildAnnouncement,
    Thread,
    GuildForum,
    Other(u8),
}

impl ChannelKind {
    /// Whether webhooks (masks) can be created and used in this channel.
    pub fn supports_masks(&self) -> bool {
        matches!(self, Self::GuildText)
    }
}

impl From<u8> for ChannelKind {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10..=12 => Self::Thread,
            15 => Self::GuildForum,
            other => Self::Other(other),
        }
    }
}

impl<'de> Deserialize<'de> for ChannelKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        u8::deserialize(d).map(Self::from)
    }
}

/// A channel as returned by `GET /channels/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// A webhook as returned by the channel webhook endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Only present for incoming webhooks the bot can see the token of.
    #[serde(default)]
    pub token: Option<String>,
    /// The account that created the webhook.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Webhook credentials used to post under an arbitrary name and avatar.
#[derive(Debug)]
pub struct Mask {
    pub id: String,
    pub token: SecretString,
}

impl Mask {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: SecretString::from(token.into()),
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// A message received over the gateway (`MESSAGE_CREATE`).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Set when the message itself was posted by a webhook.
    #[serde(default)]
    pub webhook_id: Option<String>,
}

impl InboundMessage {
    pub fn author_id(&self) -> &str {
        &self.author.id
    }

    /// Bot accounts and webhooks both count as bot-originated.
    pub fn is_from_bot(&self) -> bool {
        self.author.bot || self.webhook_id.is_some()
    }
}

/// A field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

/// A rich embed. Only the parts the bot renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    /// An embed that carries nothing but a color accent.
    pub fn color_only(color: u32) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(EmbedThumbnail { url: url.into() });
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }
}

/// Which mention kinds a message may ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

impl AllowedMentions {
    /// Users and roles, never `@everyone`.
    pub fn users_and_roles() -> Self {
        Self {
            parse: vec!["users".into(), "roles".into()],
        }
    }
}

/// A message to post through a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookMessage {
    pub content: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub embeds: Vec<Embed>,
    /// Files to re-upload with the message.
    pub attachments: Vec<Attachment>,
    pub allowed_mentions: AllowedMentions,
}

/// One option value from a slash-command invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// The command payload of an application-command interaction.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<InteractionOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    pub user: User,
}

/// Interaction type for slash commands.
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

/// An interaction received over the gateway (`INTERACTION_CREATE`).
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Present when invoked in a guild.
    #[serde(default)]
    pub member: Option<GuildMember>,
    /// Present when invoked in a DM.
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    /// The user who invoked the interaction.
    pub fn invoker(&self) -> Option<&User> {
        self.member.as_ref().map(|m| &m.user).or(self.user.as_ref())
    }

    pub fn is_command(&self) -> bool {
        self.kind == INTERACTION_APPLICATION_COMMAND
    }
}

/// A reply to a slash command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub ephemeral: bool,
}

impl InteractionReply {
    /// Ephemeral plain-text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
            ephemeral: true,
        }
    }

    /// Ephemeral single-embed reply.
    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
            ephemeral: true,
        }
    }
}
