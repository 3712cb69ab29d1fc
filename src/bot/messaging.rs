//! Delivery of long answers within Discord's message limit.

use super::{Context, Error};
use crate::utils::split_long_message;

/// Discord rejects messages over 2000 characters. Keep a margin for
/// formatting added around split parts.
pub const DISCORD_MESSAGE_LIMIT: usize = 1990;

/// Send `text` as one or more replies, none exceeding the Discord limit.
///
/// Code fences broken by a split are closed and reopened so every part
/// renders correctly on its own.
///
/// # Errors
///
/// Returns an error when `text` contains nothing to send or when Discord
/// rejects one of the replies.
pub async fn say_chunked(ctx: &Context<'_>, text: &str) -> Result<(), Error> {
    let parts = split_long_message(text, DISCORD_MESSAGE_LIMIT);
    if parts.is_empty() {
        return Err("refusing to send an empty message".into());
    }
    for part in parts {
        ctx.say(part).await?;
    }
    Ok(())
}
