//! Long-polling update source.
//!
//! Yields normalized [`InboundUpdate`]s until the cancellation token fires.
//! Failed polls are logged and retried after a short backoff; the offset is
//! advanced past every received update, including ones that are skipped.
//! On cancellation the last offset is confirmed with a zero-timeout poll so
//! a restart does not receive the same updates again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use tgbridge_types::chat::InboundUpdate;
use tgbridge_types::error::PlatformError;

use super::client::TelegramClient;
use super::types::Update;

/// Anything `getUpdates` can be called on.
pub trait UpdateSource: Send + Sync + 'static {
    fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Update>, PlatformError>> + Send;
}

impl UpdateSource for TelegramClient {
    fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Update>, PlatformError>> + Send {
        TelegramClient::get_updates(self, offset, timeout)
    }
}

/// Server-side long-poll timeout.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed poll.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Stream inbound text messages until `cancel` is triggered.
pub fn poll_updates<S: UpdateSource>(
    client: Arc<S>,
    cancel: CancellationToken,
) -> impl Stream<Item = InboundUpdate> + Send + 'static {
    async_stream::stream! {
        let mut offset: Option<i64> = None;

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = client.get_updates(offset, POLL_TIMEOUT) => polled,
            };

            match polled {
                Ok(updates) => {
                    let (next_offset, inbound) = accept_updates(offset, updates);
                    offset = next_offset;
                    for update in inbound {
                        yield update;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        backoff_secs = ERROR_BACKOFF.as_secs(),
                        "polling for updates failed"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        if offset.is_some() {
            match client.get_updates(offset, Duration::ZERO).await {
                Ok(_) => tracing::debug!(offset, "confirmed update offset"),
                Err(error) => tracing::warn!(error = %error, "failed to confirm update offset"),
            }
        }
        tracing::info!("update polling stopped");
    }
}

/// Advance the offset past `updates` and keep the usable messages.
fn accept_updates(
    offset: Option<i64>,
    updates: Vec<Update>,
) -> (Option<i64>, Vec<InboundUpdate>) {
    let mut next = offset;
    let mut inbound = Vec::with_capacity(updates.len());

    for update in updates {
        next = Some(next.map_or(update.update_id + 1, |n| n.max(update.update_id + 1)));
        match update.message.and_then(|m| m.into_inbound()) {
            Some(message) => inbound.push(message),
            None => tracing::debug!(
                update_id = update.update_id,
                "skipping update without text message"
            ),
        }
    }

    (next, inbound)
}
