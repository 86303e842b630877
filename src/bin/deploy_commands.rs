//! Register the bot's slash commands with Discord and exit.

use plural_proxy::commands::command_definitions;
use plural_proxy::config::BotConfig;
use plural_proxy::discord::{DiscordRest, Platform};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;
    let definitions = command_definitions()?;
    let count = definitions.as_array().map_or(0, Vec::len);

    tracing::info!(count, "Refreshing application (/) commands");
    DiscordRest::new(config.bot_token)
        .register_commands(&config.client_id, &definitions)
        .await?;
    tracing::info!(count, "Reloaded application (/) commands");

    Ok(())
}
