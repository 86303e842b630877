use std::sync::Arc;

use plural_proxy::bot::Bot;
use plural_proxy::commands::{CommandHandler, command_definitions};
use plural_proxy::config::BotConfig;
use plural_proxy::discord::{DiscordRest, Gateway, Platform};
use plural_proxy::proxy::{MaskCache, ProxyOrchestrator};
use plural_proxy::state::AppState;
use plural_proxy::store::{JsonFileStore, SystemStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
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

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Set USER_ID, BOT_TOKEN and CLIENT_ID in the environment or a .env file");
        std::process::exit(1);
    });

    eprintln!("🎭 Plural Proxy v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Owner: {}", config.owner_id);
    eprintln!("   Data: {}", config.data_dir.display());

    // ── State ───────────────────────────────────────────────────────────
    let store: Arc<dyn SystemStore> = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let state = Arc::new(AppState::load(config.owner_id.clone(), store).await);
    match state.system().await {
        Some(system) => eprintln!(
            "   System: {} ({} members)",
            system.name,
            system.member_count()
        ),
        None => eprintln!("   System: none yet, use /createsystem"),
    }

    // ── Discord ─────────────────────────────────────────────────────────
    let platform: Arc<dyn Platform> = Arc::new(DiscordRest::new(config.bot_token.clone()));
    let me = platform.current_user().await?;
    eprintln!("   Bot: {} ({})", me.username, me.id);

    match command_definitions() {
        Ok(defs) => {
            if let Err(e) = platform.register_commands(&config.client_id, &defs).await {
                tracing::error!(error = %e, "Failed to register slash commands");
            } else {
                tracing::info!("Slash commands registered");
            }
        }
        Err(e) => tracing::error!(error = %e, "Invalid slash command definitions"),
    }

    let masks = Arc::new(MaskCache::new(Arc::clone(&platform), me));
    let proxy = Arc::new(ProxyOrchestrator::new(
        Arc::clone(&state),
        masks,
        Arc::clone(&platform),
    ));
    let commands = Arc::new(CommandHandler::new(state));

    let events = Gateway::new(config.bot_token.clone()).start();
    Bot::new(proxy, commands, platform).run(events).await;

    Ok(())
}
