//! Update loop: one task per inbound update, drained on shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, field, info, info_span, warn};

use tgbridge_infra::telegram::poll_updates;
use tgbridge_observe::fields;
use tgbridge_types::chat::InboundUpdate;

use crate::state::AppState;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub handled: usize,
    /// Tasks still running when the grace period ran out.
    pub abandoned: usize,
}

/// Poll Telegram and dispatch every update until `cancel` fires.
pub async fn run(state: &AppState, cancel: CancellationToken) -> DrainReport {
    let updates = poll_updates(Arc::clone(&state.telegram), cancel);
    let dispatcher = Arc::clone(&state.dispatcher);

    drive(
        updates,
        move |update| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.handle(update).await }
        },
        state.config.shutdown_grace,
    )
    .await
}

/// Spawn `handle` for each update, then wait up to `grace` for the tasks
/// still in flight once the stream ends.
pub async fn drive<St, H, Fut>(updates: St, handle: H, grace: Duration) -> DrainReport
where
    St: Stream<Item = InboundUpdate>,
    H: Fn(InboundUpdate) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let tracker = TaskTracker::new();
    let mut updates = std::pin::pin!(updates);
    let mut handled = 0usize;

    while let Some(update) = updates.next().await {
        let span = info_span!(
            fields::UPDATE_SPAN,
            chat_id = field::Empty,
            user_id = field::Empty,
            message_id = field::Empty,
        );
        span.record(fields::CHAT_ID, update.chat_id.0);
        span.record(fields::USER_ID, update.user_id.0);
        span.record(fields::MESSAGE_ID, update.message_id.0);

        tracker.spawn(handle(update).instrument(span));
        handled += 1;
    }

    tracker.close();
    if !tracker.is_empty() {
        info!(
            in_flight = tracker.len(),
            grace_secs = grace.as_secs(),
            "waiting for in-flight exchanges"
        );
    }

    let abandoned = match tokio::time::timeout(grace, tracker.wait()).await {
        Ok(()) => 0,
        Err(_) => {
            warn!(
                abandoned = tracker.len(),
                "grace period elapsed, abandoning in-flight exchanges"
            );
            tracker.len()
        }
    };

    DrainReport { handled, abandoned }
}
