//! Dispatcher: turns one classified update into platform replies.
//!
//! Conversational turns hold their chat's lock from the moment the
//! continuation is read until it is committed, so messages in the same chat
//! are answered one at a time while other chats proceed independently.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{Instrument, debug, info, info_span, warn};

use tgbridge_types::chat::{ChatId, InboundUpdate, MessageId};
use tgbridge_types::config::BridgeConfig;
use tgbridge_types::error::SessionError;
use tgbridge_types::stream::BackendError;

use crate::backend::{ConversationBackend, ExchangeRequest};
use crate::conversation::ConversationStore;
use crate::platform::ChatPlatform;
use crate::projector::{LiveProjector, ProjectedAnswer};
use crate::retry::RetryPolicy;
use crate::session::SessionProvider;

use super::replies;
use super::route::{Command, Route, classify};

/// Why a conversational turn produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("no session token available, set one with /setToken")]
    NoCredential,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Routes inbound updates to commands or conversational turns.
pub struct Dispatcher<P, B, S> {
    platform: Arc<P>,
    backend: Arc<B>,
    sessions: Arc<S>,
    store: Arc<ConversationStore>,
    projector: LiveProjector<P>,
    retry: RetryPolicy,
    config: Arc<BridgeConfig>,
    bot_username: String,
}

impl<P, B, S> Dispatcher<P, B, S>
where
    P: ChatPlatform,
    B: ConversationBackend,
    S: SessionProvider,
{
    pub fn new(
        platform: Arc<P>,
        backend: Arc<B>,
        sessions: Arc<S>,
        store: Arc<ConversationStore>,
        config: Arc<BridgeConfig>,
        bot_username: impl Into<String>,
    ) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let projector =
            LiveProjector::new(Arc::clone(&platform), config.edit_rate_limit, retry.clone());
        Self {
            platform,
            backend,
            sessions,
            store,
            projector,
            retry,
            config,
            bot_username: bot_username.into(),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Handle one inbound update to completion. Never fails; problems are
    /// reported to the chat or logged.
    pub async fn handle(&self, update: InboundUpdate) {
        let route = classify(&update, &self.config, &self.bot_username);
        debug!(
            chat_id = %update.chat_id,
            user_id = %update.user_id,
            message_id = %update.message_id,
            route = ?route,
            "update classified"
        );

        match route {
            Route::Ignore => {}
            Route::Unauthorized => {
                info!(
                    chat_id = %update.chat_id,
                    user_id = %update.user_id,
                    "rejected unauthorized user"
                );
                self.reply(&update, replies::UNAUTHORIZED).await;
            }
            Route::Command(command) => self.run_command(&update, command).await,
            Route::Converse { prompt } => {
                let span = info_span!(
                    "tgbridge.exchange",
                    chat_id = %update.chat_id,
                    user_id = %update.user_id,
                    backend = self.backend.name(),
                );
                self.converse(&update, prompt).instrument(span).await;
            }
        }
    }

    async fn run_command(&self, update: &InboundUpdate, command: Command) {
        match command {
            Command::Help => self.reply(update, replies::HELP).await,
            Command::Start => self.reply(update, replies::START).await,
            Command::Reload => {
                self.store.reset(update.chat_id).await;
                info!(chat_id = %update.chat_id, "conversation reset");
                self.reply(update, replies::RELOADED).await;
            }
            Command::SetToken(token) => {
                let token = token.trim();
                if token.is_empty() {
                    self.reply(update, replies::TOKEN_MISSING).await;
                    return;
                }
                match self.sessions.persist_token(token).await {
                    Ok(()) => {
                        info!(user_id = %update.user_id, "session token updated");
                        self.reply(update, replies::TOKEN_SET).await;
                    }
                    Err(error) => {
                        warn!(error = %error, "failed to store session token");
                        self.reply(update, &replies::error(&error)).await;
                    }
                }
            }
            Command::Unknown(name) => {
                debug!(command = %name, "unknown command");
                self.reply(update, replies::UNKNOWN_COMMAND).await;
            }
        }
    }

    async fn converse(&self, update: &InboundUpdate, prompt: String) {
        match self.exchange(update, prompt).await {
            Ok(projected) => {
                info!(
                    pages = projected.messages.len(),
                    failed_calls = projected.failed_calls,
                    chars = projected.answer.text.chars().count(),
                    "exchange complete"
                );
            }
            Err(error) => {
                warn!(error = %error, "exchange failed");
                self.reply(update, &replies::error(&error)).await;

                if matches!(&error, ExchangeError::Backend(e) if e.is_auth_expired())
                    && !self.config.manual_auth
                {
                    self.refresh_session().await;
                }
            }
        }
    }

    /// One locked turn: read the continuation, stream the answer, commit.
    async fn exchange(
        &self,
        update: &InboundUpdate,
        prompt: String,
    ) -> Result<ProjectedAnswer, ExchangeError> {
        let chat_id = update.chat_id;
        let mut guard = self.store.lock(chat_id).await;

        if let Err(error) = self.platform.send_typing(chat_id).await {
            debug!(error = %error, "typing indicator failed");
        }

        let credential = self.sessions.current_token().ok_or(ExchangeError::NoCredential)?;
        let request = ExchangeRequest {
            chat_id,
            prompt,
            credential,
            continuation: guard.continuation(),
        };
        let fragments = self.backend.send(request);
        let projected = self
            .projector
            .project(chat_id, Some(update.message_id), fragments)
            .await?;

        guard.commit(&projected.answer);
        Ok(projected)
    }

    /// Acquire a new session after the backend rejected the current one.
    /// The failed turn is not resent.
    async fn refresh_session(&self) {
        let result: Result<(), SessionError> = async {
            let token = self.sessions.acquire_session().await?;
            self.sessions.persist_token(token.expose_secret()).await
        }
        .await;

        match result {
            Ok(()) => info!("session re-acquired after expiry"),
            Err(error) => warn!(error = %error, "could not re-acquire session"),
        }
    }

    async fn reply(&self, update: &InboundUpdate, text: &str) {
        self.send(update.chat_id, Some(update.message_id), text).await;
    }

    async fn send(&self, chat_id: ChatId, reply_to: Option<MessageId>, text: &str) {
        let platform = &self.platform;
        let result = self
            .retry
            .run("send_message", || platform.send_message(chat_id, reply_to, text))
            .await;
        if let Err(error) = result {
            warn!(%chat_id, error = %error, "failed to send reply");
        }
    }
}
