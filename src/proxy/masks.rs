//! Mask cache: one webhook per channel, created or adopted on first use.
//!
//! Each channel id maps to a slot that is filled at most once. Concurrent
//! resolutions of the same channel wait on the same slot, so a channel can
//! never end up with two webhooks created by this process. A failed
//! resolution leaves the slot empty and the next message tries again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::discord::{Mask, Platform, User, Webhook};
use crate::error::{ChannelError, ProxyError};

/// Name of every webhook the bot creates, and the name it looks for on adoption.
pub const MASK_NAME: &str = "Plural Proxy";

/// Audit-log reason attached when creating a webhook.
pub const MASK_REASON: &str = "Used for proxying messages from plural system members";

type Slot = Arc<OnceCell<Arc<Mask>>>;

/// Per-channel webhook cache.
pub struct MaskCache {
    platform: Arc<dyn Platform>,
    /// The bot's own account, used for ownership checks and the webhook avatar.
    bot: User,
    slots: Mutex<HashMap<String, Slot>>,
}

impl MaskCache {
    pub fn new(platform: Arc<dyn Platform>, bot: User) -> Self {
        Self {
            platform,
            bot,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the mask for `channel_id`, creating or adopting one on a miss.
    pub async fn resolve(&self, channel_id: &str) -> Result<Arc<Mask>, ProxyError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(channel_id.to_string()).or_default())
        };

        if let Some(mask) = slot.get() {
            debug!(channel_id, webhook_id = %mask.id, "Mask cache hit");
            return Ok(Arc::clone(mask));
        }

        let result = slot
            .get_or_try_init(|| self.establish(channel_id))
            .await
            .cloned();
        if let Err(ProxyError::UnsupportedChannelKind { .. }) = &result {
            self.drop_slot(channel_id, &slot).await;
        }
        result
    }

    /// The cached mask for a channel, without resolving.
    pub async fn cached(&self, channel_id: &str) -> Option<Arc<Mask>> {
        let slots = self.slots.lock().await;
        slots.get(channel_id).and_then(|slot| slot.get().cloned())
    }

    /// Forget the mask for a channel; the next resolution goes back to Discord.
    pub async fn invalidate(&self, channel_id: &str) {
        if self.slots.lock().await.remove(channel_id).is_some() {
            info!(channel_id, "Mask invalidated");
        }
    }

    /// Number of channels with a resolved mask.
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove an unfilled slot, unless it has since been replaced.
    async fn drop_slot(&self, channel_id: &str, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        if slots
            .get(channel_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized())
        {
            slots.remove(channel_id);
        }
    }

    async fn establish(&self, channel_id: &str) -> Result<Arc<Mask>, ProxyError> {
        let channel = self.platform.fetch_channel(channel_id).await?;
        if !channel.kind.supports_masks() {
            return Err(ProxyError::UnsupportedChannelKind {
                channel_id: channel_id.to_string(),
            });
        }

        let existing = self.platform.list_webhooks(channel_id).await?;
        if let Some(mask) = existing.into_iter().find_map(|wh| self.adoptable(wh)) {
            info!(channel_id, webhook_id = %mask.id, "Adopted existing webhook");
            return Ok(Arc::new(mask));
        }

        let avatar = self.bot.avatar_url();
        let webhook = self
            .platform
            .create_webhook(channel_id, MASK_NAME, Some(&avatar), MASK_REASON)
            .await?;
        let token = webhook.token.ok_or_else(|| {
            ChannelError::InvalidPayload(format!("webhook {} was created without a token", webhook.id))
        })?;

        info!(channel_id, webhook_id = %webhook.id, "Created webhook for channel");
        Ok(Arc::new(Mask::new(webhook.id, token)))
    }

    /// A webhook is ours to reuse if this bot made it under the well-known name.
    fn adoptable(&self, webhook: Webhook) -> Option<Mask> {
        let owned = webhook.user.as_ref().is_some_and(|u| u.id == self.bot.id);
        let named = webhook.name.as_deref() == Some(MASK_NAME);
        if !(owned && named) {
            return None;
        }
        webhook.token.map(|token| Mask::new(webhook.id, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::ChannelKind;
    use crate::discord::fake::FakePlatform;

    fn cache(platform: &Arc<FakePlatform>) -> MaskCache {
        MaskCache::new(platform.clone(), FakePlatform::bot_user())
    }

    #[tokio::test]
    async fn miss_creates_then_hit_reuses() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        let masks = cache(&platform);

        let first = masks.resolve("C").await.unwrap();
        let second = masks.resolve("C").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(platform.webhooks_created(), 1);
        assert_eq!(platform.channel_fetches(), 1);
        assert_eq!(masks.len().await, 1);
    }

    #[tokio::test]
    async fn created_webhook_uses_well_known_name_and_bot_avatar() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        cache(&platform).resolve("C").await.unwrap();

        let created = platform.created_webhooks();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].channel_id, "C");
        assert_eq!(created[0].name, MASK_NAME);
        let avatar = FakePlatform::bot_user().avatar_url();
        assert_eq!(created[0].avatar_url.as_deref(), Some(avatar.as_str()));
        assert_eq!(created[0].reason, MASK_REASON);
    }

    #[tokio::test]
    async fn concurrent_misses_create_once() {
        let platform = Arc::new(FakePlatform::new().with_latency());
        platform.add_channel("C", ChannelKind::GuildText);
        let masks = Arc::new(cache(&platform));

        let (a, b, c) = tokio::join!(masks.resolve("C"), masks.resolve("C"), masks.resolve("C"));

        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(platform.webhooks_created(), 1);
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C1", ChannelKind::GuildText);
        platform.add_channel("C2", ChannelKind::GuildText);
        let masks = cache(&platform);

        let one = masks.resolve("C1").await.unwrap();
        let two = masks.resolve("C2").await.unwrap();
        assert_ne!(one.id, two.id);
        assert_eq!(platform.webhooks_created(), 2);
    }

    #[tokio::test]
    async fn adopts_own_named_webhook() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        platform.add_existing_webhook("C", "old-1", MASK_NAME, &FakePlatform::bot_user().id);
        let masks = cache(&platform);

        let mask = masks.resolve("C").await.unwrap();
        assert_eq!(mask.id, "old-1");
        assert_eq!(platform.webhooks_created(), 0);
    }

    #[tokio::test]
    async fn ignores_foreign_or_renamed_webhooks() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        platform.add_existing_webhook("C", "theirs", MASK_NAME, "someone-else");
        platform.add_existing_webhook("C", "renamed", "Other Hook", &FakePlatform::bot_user().id);
        let masks = cache(&platform);

        let mask = masks.resolve("C").await.unwrap();
        assert_ne!(mask.id, "theirs");
        assert_ne!(mask.id, "renamed");
        assert_eq!(platform.webhooks_created(), 1);
    }

    #[tokio::test]
    async fn unsupported_channel_kind() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("DM", ChannelKind::Dm);
        let masks = cache(&platform);

        let err = masks.resolve("DM").await.unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedChannelKind { ref channel_id } if channel_id == "DM"));
        assert!(masks.is_empty().await);
        assert!(!masks.slots.lock().await.contains_key("DM"));
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        platform.fail_create_webhook(true);
        let masks = cache(&platform);

        assert!(matches!(masks.resolve("C").await, Err(ProxyError::Transport(_))));
        assert!(masks.cached("C").await.is_none());

        platform.fail_create_webhook(false);
        assert!(masks.resolve("C").await.is_ok());
        assert_eq!(platform.webhooks_created(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_fresh_resolution() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        let masks = cache(&platform);

        let first = masks.resolve("C").await.unwrap();
        masks.invalidate("C").await;
        assert!(masks.cached("C").await.is_none());

        let second = masks.resolve("C").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        // The first webhook still exists remotely and is adopted.
        assert_eq!(second.id, first.id);
        assert_eq!(platform.webhooks_created(), 1);
        assert_eq!(platform.channel_fetches(), 2);
    }
}
