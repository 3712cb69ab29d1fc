//! Discord surface
//!
//! Command definitions, the shared command context and the client runner.

/// Slash command implementations
pub mod commands;
/// Reply plumbing shared by command handlers
pub mod messaging;

use crate::db::Database;
use crate::health::AppStatus;
use crate::llm::{ChatClient, EmbeddingProvider};
use crate::search::Retriever;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

/// Data shared with every command invocation
pub struct Data {
    /// MongoDB store behind the commands
    pub db: Database,
    /// OpenAI chat client producing answers
    pub chat: ChatClient,
    /// Two-stage retriever over the knowledge base
    pub retriever: Retriever<Database, EmbeddingProvider>,
    /// Readiness flag shared with the health endpoint
    pub status: Arc<AppStatus>,
}

/// Error type shared by all command handlers
pub type Error = Box<dyn std::error::Error + Send + Sync>;
/// Poise context alias for command handlers
pub type Context<'a> = poise::Context<'a, Data, Error>;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("Error: {error}")).await {
                error!("Failed to report command error: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Ready { data_about_bot } = event {
        data.status.mark_discord_ready();
        info!("Bot is ready! Logged in as {}", data_about_bot.user.name);
        info!("Connected to {} servers", data_about_bot.guilds.len());
    }
    Ok(())
}

fn framework(data: Data) -> poise::Framework<Data, Error> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::ask(),
                commands::stats(),
                commands::debug(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands synced globally");
                Ok(data)
            })
        })
        .build()
}

/// Run the Discord client until shutdown.
///
/// Builds the command framework, registers the slash commands globally and
/// starts exactly one gateway client. Ctrl-C shuts the shards down
/// gracefully.
///
/// # Errors
///
/// Returns a serenity error when the client cannot be built or the gateway
/// connection fails irrecoverably.
pub async fn run(token: String, data: Data) -> Result<(), serenity::Error> {
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework(data))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down gracefully...");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await
}
