//! Classification of inbound updates.
//!
//! Pure: no I/O, so every routing rule is testable on its own.

use tgbridge_types::chat::{CommandInvocation, InboundUpdate};
use tgbridge_types::config::BridgeConfig;

/// What to do with an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Sender is not on the allow-list.
    Unauthorized,
    Command(Command),
    /// Forward `prompt` to the backend.
    Converse { prompt: String },
    /// Not meant for this bot.
    Ignore,
}

/// Bot commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Reload,
    /// `/setToken <value>`; the value may be empty.
    SetToken(String),
    Unknown(String),
}

impl Command {
    /// Map a parsed invocation to a command. Names match case-insensitively.
    pub fn from_invocation(invocation: &CommandInvocation) -> Self {
        match invocation.name.to_ascii_lowercase().as_str() {
            "help" => Command::Help,
            "start" => Command::Start,
            "reload" => Command::Reload,
            "settoken" => Command::SetToken(invocation.args.clone()),
            _ => Command::Unknown(invocation.name.clone()),
        }
    }
}

/// Decide how to handle `update`.
///
/// `bot_username` is the bot's own username without the `@`.
pub fn classify(update: &InboundUpdate, config: &BridgeConfig, bot_username: &str) -> Route {
    if !config.is_allowed(update.user_id) {
        return Route::Unauthorized;
    }

    if let Some(invocation) = &update.command {
        if let Some(addressee) = &invocation.addressee {
            if !addressee.eq_ignore_ascii_case(bot_username) {
                return Route::Ignore;
            }
        }
        return Route::Command(Command::from_invocation(invocation));
    }

    let prompt = if update.chat_kind.is_group() {
        match strip_mention(&update.text, bot_username) {
            Some(prompt) => prompt,
            None => return Route::Ignore,
        }
    } else {
        update.text.trim()
    };

    if prompt.is_empty() {
        Route::Ignore
    } else {
        Route::Converse {
            prompt: prompt.to_string(),
        }
    }
}

/// Remove an `@bot_username` mention at the start or end of `text`.
///
/// Returns `None` when the bot is not mentioned in either position.
fn strip_mention<'a>(text: &'a str, bot_username: &str) -> Option<&'a str> {
    if bot_username.is_empty() {
        return None;
    }
    let mention = format!("@{bot_username}");
    let text = text.trim();

    if let Some(head) = text.get(..mention.len()) {
        if head.eq_ignore_ascii_case(&mention) {
            let rest = &text[mention.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Some(rest.trim());
            }
        }
    }

    let tail_start = text.len().checked_sub(mention.len())?;
    if let Some(tail) = text.get(tail_start..) {
        if tail.eq_ignore_ascii_case(&mention) {
            let rest = &text[..tail_start];
            if rest.is_empty() || rest.ends_with(char::is_whitespace) {
                return Some(rest.trim());
            }
        }
    }

    None
}
