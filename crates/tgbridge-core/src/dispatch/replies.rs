//! User-facing reply texts.

pub const UNAUTHORIZED: &str = "You are not authorized to use this bot.";

pub const START: &str = "Send a message to start talking with ChatGPT. \
You can use /reload at any point to clear the conversation history and start from scratch \
(don't worry, it won't delete the Telegram messages).";

pub const HELP: &str = "/reload - clear chatGPT conversation history \
(Telegram messages will not be deleted)\n\
/setToken <token> - set the openAI session token";

pub const RELOADED: &str = "Started a new conversation. Enjoy!";

pub const TOKEN_SET: &str = "Token set successfully.";

pub const TOKEN_MISSING: &str = "Please provide a token. Example: /setToken eyJhB...";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Send /help to see a list of commands.";

/// Inline error reply for a failed operation.
pub fn error(message: impl std::fmt::Display) -> String {
    format!("Error: {message}")
}
