//! Slash commands exposed to Discord servers.

use super::{messaging, Context, Error};
use crate::config::SEARCH_TOP_K;
use crate::db::{GuildStats, QaRecord};
use mongodb::bson::DateTime as BsonDateTime;
use tracing::{error, info};

/// Guild name from the cache. Commands are guild-only, but the guild may
/// be absent from the cache right after a reconnect.
fn guild_name(ctx: &Context<'_>) -> String {
    ctx.guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| "this server".to_string())
}

fn guild_id(ctx: &Context<'_>) -> String {
    ctx.guild_id().map(|id| id.to_string()).unwrap_or_default()
}

/// Record a question/answer pair. History is best-effort: a write failure
/// is logged and never surfaces to the user.
async fn record_qa(ctx: &Context<'_>, question: &str, answer: &str, success: bool) {
    let record = QaRecord {
        timestamp: BsonDateTime::now(),
        guild_id: guild_id(ctx),
        guild_name: guild_name(ctx),
        user_id: ctx.author().id.to_string(),
        username: ctx.author().name.clone(),
        question: question.to_string(),
        answer: answer.to_string(),
        success,
    };
    if let Err(e) = ctx.data().db.record_qa(record).await {
        error!("Failed to record Q&A history: {e}");
    }
}

/// Test if the bot is working
#[poise::command(slash_command, guild_only)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    match ctx.data().db.test_connection().await {
        Ok(status) => {
            ctx.say(format!(
                "\u{2705} Bot and database are working!\n\
                 Connected to: {}\n\
                 Database: {}\n\
                 Last Heartbeat: {}",
                guild_name(&ctx),
                status.database,
                status.last_heartbeat.format("%Y-%m-%d %H:%M:%S UTC"),
            ))
            .await?;
        }
        Err(e) => {
            ctx.say(format!(
                "\u{26a0}\u{fe0f} Bot is working but database connection failed: {e}"
            ))
            .await?;
        }
    }
    Ok(())
}

/// Ask about Quantified Ante trading concepts
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question about trading"] question: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    info!(
        "Question from {} in {}: {}",
        ctx.author().name,
        guild_name(&ctx),
        question
    );

    let data = ctx.data();
    let chunks = data.retriever.search(&question, SEARCH_TOP_K).await;
    if chunks.is_empty() {
        record_qa(&ctx, &question, "No relevant information found", false).await;
        ctx.say("I couldn't find relevant information. Please try rephrasing your question.")
            .await?;
        return Ok(());
    }

    let context = chunks.join("\n");
    let answer = data.chat.answer(&context, &question).await?;
    record_qa(&ctx, &question, &answer, true).await;
    messaging::say_chunked(&ctx, &answer).await?;
    Ok(())
}

/// Render the stats reply for one guild. Zero recorded questions is a
/// 0.0% success rate, not a division error.
fn format_stats(guild_name: &str, stats: &GuildStats) -> String {
    #[allow(clippy::cast_precision_loss)]
    let success_rate = if stats.total > 0 {
        stats.successful as f64 / stats.total as f64 * 100.0
    } else {
        0.0
    };

    let mut message = format!(
        "\u{1f4ca} Stats for {guild_name}:\n\
         Total Questions: {}\n\
         Successful Answers: {}\n\
         Success Rate: {success_rate:.1}%\n\n\
         Recent Questions:",
        stats.total, stats.successful,
    );
    for qa in &stats.recent {
        let status = if qa.success { "\u{2705}" } else { "\u{274c}" };
        let timestamp = qa.timestamp_utc().format("%Y-%m-%d %H:%M");
        message.push_str(&format!(
            "\n{status} [{timestamp}] {}: {}",
            qa.username, qa.question
        ));
    }
    message
}

/// Get Q&A statistics for this server
#[poise::command(slash_command, guild_only)]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    match ctx.data().db.guild_stats(&guild_id(&ctx)).await {
        Ok(stats) => {
            ctx.say(format_stats(&guild_name(&ctx), &stats)).await?;
        }
        Err(e) => {
            ctx.say(format!("Error getting stats: {e}")).await?;
        }
    }
    Ok(())
}

/// Debug database content
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn debug(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    match ctx.data().db.debug_info().await {
        Ok(report) => {
            let fields = report
                .sample_fields
                .map_or_else(|| "No documents found".to_string(), |f| format!("{f:?}"));
            ctx.say(format!(
                "\u{1f4ca} Database Debug Info:\n\
                 Documents Collection: {} documents\n\
                 QA History: {} entries\n\n\
                 Sample Document Fields: {fields}",
                report.documents, report.qa_entries,
            ))
            .await?;
        }
        Err(e) => {
            ctx.say(format!("Debug error: {e}")).await?;
        }
    }
    Ok(())
}
