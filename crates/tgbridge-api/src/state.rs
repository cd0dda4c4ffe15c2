//! Application state wiring all services together.
//!
//! The dispatcher is generic over platform, backend and session traits;
//! AppState pins it to the concrete infra implementations.

use std::sync::Arc;

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use tgbridge_core::conversation::ConversationStore;
use tgbridge_core::dispatch::Dispatcher;
use tgbridge_core::session::SessionProvider;
use tgbridge_infra::chatgpt::ChatGptBackend;
use tgbridge_infra::config::default_config_dir;
use tgbridge_infra::session::FileSessionProvider;
use tgbridge_infra::telegram::TelegramClient;
use tgbridge_types::config::BridgeConfig;

use crate::cli::Cli;

/// Concrete type alias for the dispatcher pinned to infra implementations.
pub type ConcreteDispatcher = Dispatcher<TelegramClient, ChatGptBackend, FileSessionProvider>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub telegram: Arc<TelegramClient>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub config: Arc<BridgeConfig>,
    pub bot_username: String,
}

impl AppState {
    /// Validate configuration, make sure a session exists, and verify the
    /// bot token. Any failure here is fatal.
    pub async fn init(cli: &Cli) -> anyhow::Result<Self> {
        let config = Arc::new(cli.bridge_config().context("invalid configuration")?);

        let config_dir = match &cli.config_dir {
            Some(dir) => dir.clone(),
            None => default_config_dir()
                .context("no config directory available, set TGBRIDGE_CONFIG_DIR")?,
        };
        let sessions = Arc::new(
            FileSessionProvider::open(&config_dir)
                .await
                .context("couldn't load persistent config")?,
        );

        if !sessions.has_token() && !config.manual_auth {
            let token = sessions
                .acquire_session()
                .await
                .context("couldn't get a ChatGPT session")?;
            sessions
                .persist_token(token.expose_secret())
                .await
                .context("couldn't save the ChatGPT session")?;
        } else if !sessions.has_token() {
            warn!("no session token stored; send /setToken <token> to the bot before chatting");
        }

        let backend = Arc::new(
            ChatGptBackend::new(&cli.chatgpt_base_url, &cli.chatgpt_model)
                .context("couldn't create backend client")?,
        );
        info!(base_url = %backend.base_url(), model = %backend.model(), "ChatGPT backend ready");

        let telegram = Arc::new(
            TelegramClient::new(SecretString::from(cli.telegram_token.clone()))
                .context("couldn't create Telegram client")?,
        );
        let me = telegram.get_me().await.context("couldn't start Telegram bot")?;
        let bot_username = me.username.unwrap_or_default();
        if bot_username.is_empty() {
            warn!("bot has no username; group mentions will not be recognised");
        }

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&telegram),
            backend,
            sessions,
            Arc::new(ConversationStore::new()),
            Arc::clone(&config),
            bot_username.clone(),
        ));

        Ok(Self {
            telegram,
            dispatcher,
            config,
            bot_username,
        })
    }
}
