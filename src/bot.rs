//! Event loop: routes gateway events to the proxy and command paths.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, CommandHandler, handler::GENERIC_ERROR};
use crate::discord::{
    EventStream, GatewayEvent, InboundMessage, Interaction, InteractionReply, Platform,
};
use crate::proxy::{ProxyOrchestrator, ProxyOutcome};

/// Wires the event stream to the proxy orchestrator and the command handler.
#[derive(Clone)]
pub struct Bot {
    proxy: Arc<ProxyOrchestrator>,
    commands: Arc<CommandHandler>,
    platform: Arc<dyn Platform>,
}

impl Bot {
    pub fn new(
        proxy: Arc<ProxyOrchestrator>,
        commands: Arc<CommandHandler>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            proxy,
            commands,
            platform,
        }
    }

    /// Consume events until the stream ends or Ctrl+C.
    ///
    /// Each event is handled on its own task so a slow channel never holds up
    /// the others.
    pub async fn run(self, mut events: EventStream) {
        info!("Bot ready and listening");
        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        info!("Gateway stream ended, shutting down...");
                        break;
                    }
                },
            };

            let bot = self.clone();
            tokio::spawn(async move { bot.handle_event(event).await });
        }
    }

    pub async fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready { user } => {
                info!(user = %user.username, id = %user.id, "Logged in to Discord");
            }
            GatewayEvent::MessageCreate(message) => {
                self.handle_message(&message).await;
            }
            GatewayEvent::InteractionCreate(interaction) => {
                self.handle_interaction(&interaction).await;
            }
        }
    }

    async fn handle_message(&self, message: &InboundMessage) -> ProxyOutcome {
        let outcome = self.proxy.maybe_proxy(message).await;
        debug!(message_id = %message.id, outcome = ?outcome, "Message handled");
        outcome
    }

    /// Answer a slash command. Non-command interactions are ignored.
    async fn handle_interaction(&self, interaction: &Interaction) {
        let Some(reply) = self.reply_for(interaction).await else {
            return;
        };
        if let Err(e) = self
            .platform
            .respond_to_interaction(&interaction.id, &interaction.token, &reply)
            .await
        {
            error!(interaction_id = %interaction.id, error = %e, "Failed to reply to interaction");
        }
    }

    async fn reply_for(&self, interaction: &Interaction) -> Option<InteractionReply> {
        if !interaction.is_command() {
            return None;
        }
        let (Some(data), Some(invoker)) = (&interaction.data, interaction.invoker()) else {
            warn!(interaction_id = %interaction.id, "Command interaction without data or invoker");
            return Some(InteractionReply::text(GENERIC_ERROR));
        };

        match Command::parse(data) {
            Ok(command) => {
                info!(command = command.name(), invoker = %invoker.id, "Running command");
                Some(self.commands.handle(&invoker.id, command).await)
            }
            Err(e) => {
                warn!(command = %data.name, error = %e, "Could not parse command");
                Some(InteractionReply::text(GENERIC_ERROR))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::handler::NOT_AUTHORIZED;
    use crate::discord::fake::FakePlatform;
    use crate::discord::{ChannelKind, User};
    use crate::proxy::MaskCache;
    use crate::state::AppState;
    use crate::store::MemoryStore;
    use crate::system::{MemberDraft, SystemDraft};
    use serde_json::json;

    const OWNER: &str = "42";

    async fn bot() -> (Bot, Arc<FakePlatform>) {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C", ChannelKind::GuildText);
        let state = Arc::new(AppState::new(OWNER, Arc::new(MemoryStore::new())));
        state
            .create_system(SystemDraft {
                name: "Crew".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        state
            .add_member(MemberDraft::new("Alice").with_prefix("A:"))
            .await
            .unwrap();

        let masks = Arc::new(MaskCache::new(platform.clone(), FakePlatform::bot_user()));
        let proxy = Arc::new(ProxyOrchestrator::new(state.clone(), masks, platform.clone()));
        let commands = Arc::new(CommandHandler::new(state));
        (Bot::new(proxy, commands, platform.clone()), platform)
    }

    fn interaction(invoker: &str, data: serde_json::Value) -> Interaction {
        serde_json::from_value(json!({
            "id": "i1",
            "token": "tok",
            "type": 2,
            "data": data,
            "member": {"user": {"id": invoker, "username": "someone"}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn message_event_is_proxied() {
        let (bot, platform) = bot().await;
        let message = InboundMessage {
            id: "m1".into(),
            channel_id: "C".into(),
            guild_id: None,
            author: User {
                id: OWNER.into(),
                username: "owner".into(),
                avatar: None,
                bot: false,
            },
            content: "A: hi".into(),
            attachments: Vec::new(),
            webhook_id: None,
        };

        bot.handle_event(GatewayEvent::MessageCreate(message)).await;
        assert_eq!(platform.sent()[0].message.content, "hi");
        assert_eq!(platform.deleted().len(), 1);
    }

    #[tokio::test]
    async fn command_interaction_gets_reply() {
        let (bot, platform) = bot().await;
        let event = GatewayEvent::InteractionCreate(interaction(OWNER, json!({"name": "members"})));

        bot.handle_event(event).await;
        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "i1");
        assert_eq!(replies[0].1.embeds[0].fields[0].name, "Alice");
    }

    #[tokio::test]
    async fn non_owner_command_is_denied() {
        let (bot, platform) = bot().await;
        let event = GatewayEvent::InteractionCreate(interaction("7", json!({"name": "members"})));

        bot.handle_event(event).await;
        assert_eq!(platform.replies()[0].1.content.as_deref(), Some(NOT_AUTHORIZED));
    }

    #[tokio::test]
    async fn unparseable_command_gets_generic_error() {
        let (bot, platform) = bot().await;
        let event = GatewayEvent::InteractionCreate(interaction(OWNER, json!({"name": "deletemember"})));

        bot.handle_event(event).await;
        assert_eq!(platform.replies()[0].1.content.as_deref(), Some(GENERIC_ERROR));
    }

    #[tokio::test]
    async fn non_command_interactions_are_ignored() {
        let (bot, platform) = bot().await;
        let mut ping = interaction(OWNER, json!({"name": "members"}));
        ping.kind = 1;

        bot.handle_event(GatewayEvent::InteractionCreate(ping)).await;
        assert!(platform.replies().is_empty());
    }
}
