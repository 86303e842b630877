//! Proxy orchestrator: turns a tagged owner message into a masked repost.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::discord::{AllowedMentions, Embed, InboundMessage, Platform, WebhookMessage};
use crate::error::{ChannelError, ProxyError};
use crate::proxy::masks::MaskCache;
use crate::proxy::matcher::match_tags;
use crate::state::AppState;
use crate::system::Member;
use crate::system::model::color_value;

/// Why a message was skipped before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Posted by a bot account or a webhook (including our own masks).
    FromBot,
    /// Posted by someone other than the configured owner.
    NotOwner,
}

/// What happened to one inbound message.
#[derive(Debug)]
pub enum ProxyOutcome {
    Ignored(IgnoreReason),
    NoMatch,
    Failed(ProxyError),
    Proxied {
        member_id: String,
        /// False when the repost went out but the original could not be removed.
        original_deleted: bool,
    },
}

impl ProxyOutcome {
    /// Whether the message was reposted under a mask.
    pub fn proxied(&self) -> bool {
        matches!(self, Self::Proxied { .. })
    }
}

pub struct ProxyOrchestrator {
    state: Arc<AppState>,
    masks: Arc<MaskCache>,
    platform: Arc<dyn Platform>,
}

impl ProxyOrchestrator {
    pub fn new(state: Arc<AppState>, masks: Arc<MaskCache>, platform: Arc<dyn Platform>) -> Self {
        Self {
            state,
            masks,
            platform,
        }
    }

    /// Proxy `message` if it carries a member's tags. Never returns an error;
    /// failures are logged and reported in the outcome.
    pub async fn maybe_proxy(&self, message: &InboundMessage) -> ProxyOutcome {
        if message.is_from_bot() {
            return ProxyOutcome::Ignored(IgnoreReason::FromBot);
        }
        if !self.state.is_owner(message.author_id()) {
            return ProxyOutcome::Ignored(IgnoreReason::NotOwner);
        }

        let members = self.state.members().await;
        let Some(matched) = match_tags(&message.content, &members) else {
            return ProxyOutcome::NoMatch;
        };
        let member = matched.member;
        debug!(
            channel_id = %message.channel_id,
            member = %member.name,
            "Message matched member tags"
        );

        let mask = match self.masks.resolve(&message.channel_id).await {
            Ok(mask) => mask,
            Err(e) => {
                warn!(channel_id = %message.channel_id, error = %e, "Could not resolve mask");
                return ProxyOutcome::Failed(e);
            }
        };

        let outbound = masked_message(member, matched.content, message);
        if let Err(e) = self.platform.execute_webhook(&mask, &outbound).await {
            warn!(
                channel_id = %message.channel_id,
                webhook_id = %mask.id,
                error = %e,
                "Failed to send proxied message"
            );
            if matches!(e, ChannelError::UnknownWebhook(_)) {
                self.masks.invalidate(&message.channel_id).await;
            }
            return ProxyOutcome::Failed(e.into());
        }

        let original_deleted = match self
            .platform
            .delete_message(&message.channel_id, &message.id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    channel_id = %message.channel_id,
                    message_id = %message.id,
                    error = %e,
                    "Proxied message but could not delete the original"
                );
                false
            }
        };

        info!(
            channel_id = %message.channel_id,
            member = %member.name,
            original_deleted,
            "Proxied message"
        );
        ProxyOutcome::Proxied {
            member_id: member.id.clone(),
            original_deleted,
        }
    }
}

/// Build the repost for `member` from the stripped text and the original's files.
fn masked_message(member: &Member, content: String, original: &InboundMessage) -> WebhookMessage {
    let embeds = member
        .color
        .as_deref()
        .and_then(color_value)
        .map(|color| vec![Embed::color_only(color)])
        .unwrap_or_default();

    WebhookMessage {
        content,
        username: member.shown_name().to_string(),
        avatar_url: member.avatar.clone(),
        embeds,
        attachments: original.attachments.clone(),
        allowed_mentions: AllowedMentions::users_and_roles(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::fake::FakePlatform;
    use crate::discord::{Attachment, ChannelKind, User};
    use crate::store::MemoryStore;
    use crate::system::{MemberDraft, SystemDraft};

    const OWNER: &str = "42";

    struct Harness {
        platform: Arc<FakePlatform>,
        state: Arc<AppState>,
        masks: Arc<MaskCache>,
        proxy: ProxyOrchestrator,
    }

    async fn harness(members: Vec<MemberDraft>) -> Harness {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        platform.add_channel("DM", ChannelKind::Dm);

        let state = Arc::new(AppState::new(OWNER, Arc::new(MemoryStore::new())));
        state
            .create_system(SystemDraft {
                name: "Crew".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        for draft in members {
            state.add_member(draft).await.unwrap();
        }

        let masks = Arc::new(MaskCache::new(platform.clone(), FakePlatform::bot_user()));
        let proxy = ProxyOrchestrator::new(state.clone(), masks.clone(), platform.clone());
        Harness {
            platform,
            state,
            masks,
            proxy,
        }
    }

    fn message(author: &str, channel: &str, content: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            channel_id: channel.into(),
            guild_id: Some("guild".into()),
            author: User {
                id: author.into(),
                username: "someone".into(),
                avatar: None,
                bot: false,
            },
            content: content.into(),
            attachments: Vec::new(),
            webhook_id: None,
        }
    }

    #[tokio::test]
    async fn proxies_prefixed_message() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "A: hello there")).await;
        assert!(matches!(outcome, ProxyOutcome::Proxied { original_deleted: true, .. }));

        let sent = h.platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "token-wh-0");
        assert_eq!(sent[0].message.username, "Alice");
        assert_eq!(sent[0].message.content, "hello there");
        assert!(sent[0].message.embeds.is_empty());
        assert_eq!(h.platform.deleted(), vec![("C".to_string(), "m1".to_string())]);
    }

    #[tokio::test]
    async fn display_name_avatar_and_color_are_applied() {
        let h = harness(vec![
            MemberDraft::new("Bob")
                .with_suffix("-b")
                .with_display_name("Bobby")
                .with_avatar("https://img.example/bob.png")
                .with_color("ff8800"),
        ])
        .await;

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "going out-b")).await;
        assert!(outcome.proxied());

        let sent = &h.platform.sent()[0].message;
        assert_eq!(sent.username, "Bobby");
        assert_eq!(sent.content, "going out");
        assert_eq!(sent.avatar_url.as_deref(), Some("https://img.example/bob.png"));
        assert_eq!(sent.embeds, vec![Embed::color_only(0xff8800)]);
        assert_eq!(sent.allowed_mentions, AllowedMentions::users_and_roles());
    }

    #[tokio::test]
    async fn attachments_are_forwarded() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;
        let mut msg = message(OWNER, "C", "A: look");
        msg.attachments = vec![Attachment {
            id: "a1".into(),
            filename: "cat.png".into(),
            url: "https://cdn.example/cat.png".into(),
            content_type: Some("image/png".into()),
            size: 1024,
        }];

        h.proxy.maybe_proxy(&msg).await;
        assert_eq!(h.platform.sent()[0].message.attachments, msg.attachments);
    }

    #[tokio::test]
    async fn non_owner_is_ignored_before_matching() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;

        let outcome = h.proxy.maybe_proxy(&message("7", "C", "A: hello")).await;
        assert!(matches!(outcome, ProxyOutcome::Ignored(IgnoreReason::NotOwner)));
        assert!(h.platform.sent().is_empty());
        assert_eq!(h.platform.channel_fetches(), 0);
    }

    #[tokio::test]
    async fn bot_and_webhook_messages_are_ignored() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;

        let mut from_bot = message(OWNER, "C", "A: hi");
        from_bot.author.bot = true;
        assert!(matches!(
            h.proxy.maybe_proxy(&from_bot).await,
            ProxyOutcome::Ignored(IgnoreReason::FromBot)
        ));

        let mut from_hook = message(OWNER, "C", "A: hi");
        from_hook.webhook_id = Some("wh".into());
        assert!(matches!(
            h.proxy.maybe_proxy(&from_hook).await,
            ProxyOutcome::Ignored(IgnoreReason::FromBot)
        ));
    }

    #[tokio::test]
    async fn untagged_message_is_left_alone() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "plain words")).await;
        assert!(matches!(outcome, ProxyOutcome::NoMatch));
        assert!(h.platform.deleted().is_empty());
        assert!(h.masks.is_empty().await);
    }

    #[tokio::test]
    async fn no_system_means_no_match() {
        let platform = Arc::new(FakePlatform::new());
        let state = Arc::new(AppState::new(OWNER, Arc::new(MemoryStore::new())));
        let masks = Arc::new(MaskCache::new(platform.clone(), FakePlatform::bot_user()));
        let proxy = ProxyOrchestrator::new(state, masks, platform);

        let outcome = proxy.maybe_proxy(&message(OWNER, "C", "A: hi")).await;
        assert!(matches!(outcome, ProxyOutcome::NoMatch));
    }

    #[tokio::test]
    async fn unsupported_channel_fails_without_side_effects() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "DM", "A: hi")).await;
        assert!(matches!(
            outcome,
            ProxyOutcome::Failed(ProxyError::UnsupportedChannelKind { .. })
        ));
        assert!(h.platform.sent().is_empty());
        assert!(h.platform.deleted().is_empty());
    }

    #[tokio::test]
    async fn send_failure_keeps_original() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;
        h.platform.fail_send(true);

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "A: hi")).await;
        assert!(matches!(outcome, ProxyOutcome::Failed(ProxyError::Transport(_))));
        assert!(h.platform.deleted().is_empty());
        // An ordinary send failure does not drop the cached mask.
        assert!(h.masks.cached("C").await.is_some());
    }

    #[tokio::test]
    async fn unknown_webhook_invalidates_mask() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;
        h.proxy.maybe_proxy(&message(OWNER, "C", "A: first")).await;
        assert!(h.masks.cached("C").await.is_some());

        h.platform.webhook_gone(true);
        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "A: second")).await;
        assert!(matches!(
            outcome,
            ProxyOutcome::Failed(ProxyError::Transport(ChannelError::UnknownWebhook(_)))
        ));
        assert!(h.masks.cached("C").await.is_none());
        assert_eq!(h.platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_is_reported_not_fatal() {
        let h = harness(vec![MemberDraft::new("Alice").with_prefix("A:")]).await;
        h.platform.fail_delete(true);

        let outcome = h.proxy.maybe_proxy(&message(OWNER, "C", "A: hi")).await;
        assert!(matches!(outcome, ProxyOutcome::Proxied { original_deleted: false, .. }));
        assert_eq!(h.platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn first_registered_member_wins() {
        let h = harness(vec![
            MemberDraft::new("Broad").with_prefix("A"),
            MemberDraft::new("Narrow").with_prefix("A:"),
        ])
        .await;
        let broad = h.state.members().await[0].id.clone();

        match h.proxy.maybe_proxy(&message(OWNER, "C", "A:hi")).await {
            ProxyOutcome::Proxied { member_id, .. } => assert_eq!(member_id, broad),
            other => panic!("expected proxied, got {other:?}"),
        }
        assert_eq!(h.platform.sent()[0].message.content, ":hi");
    }
}
