//! Live output projector: renders a fragment stream as an edited message.
//!
//! The first fragment opens a new platform message. Later fragments are
//! accumulated and flushed by a timer-gated accumulator: at most one render
//! per `min_edit_interval`, always carrying the newest accumulated text.
//! The terminal fragment is rendered immediately regardless of the timer.
//!
//! Answers longer than the platform limit are split into pages; every page
//! is its own live message and follow-up pages are sent as new replies.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use tgbridge_types::chat::{ChatId, LiveMessage, MessageId};
use tgbridge_types::error::PlatformError;
use tgbridge_types::stream::{BackendError, CompletedAnswer, StreamFragment};

use crate::backend::FragmentStream;
use crate::platform::ChatPlatform;
use crate::retry::RetryPolicy;

use super::pages::paginate;

/// Shown while the answer is still empty; platforms reject empty messages.
pub const PLACEHOLDER: &str = "...";

/// Result of a fully projected answer.
#[derive(Debug, Clone)]
pub struct ProjectedAnswer {
    pub answer: CompletedAnswer,
    /// Live messages in page order.
    pub messages: Vec<LiveMessage>,
    /// Platform calls that still failed after retrying.
    pub failed_calls: u32,
}

/// Drives rate-limited edits for streamed answers.
pub struct LiveProjector<P> {
    platform: Arc<P>,
    min_edit_interval: Duration,
    retry: RetryPolicy,
}

impl<P: ChatPlatform> LiveProjector<P> {
    pub fn new(platform: Arc<P>, min_edit_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            platform,
            min_edit_interval,
            retry,
        }
    }

    pub fn min_edit_interval(&self) -> Duration {
        self.min_edit_interval
    }

    /// Drain `fragments` into the chat, replying to `reply_to`.
    ///
    /// Returns the completed answer, or the backend error that ended the
    /// stream. On error whatever was already accumulated is flushed first and
    /// left in place as the final-so-far output.
    pub async fn project(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        mut fragments: FragmentStream,
    ) -> Result<ProjectedAnswer, BackendError> {
        let mut output = LiveOutput {
            platform: self.platform.as_ref(),
            retry: &self.retry,
            chat_id,
            reply_to,
            max_len: self.platform.max_message_len(),
            messages: Vec::new(),
            failed_calls: 0,
        };
        let mut accumulated = String::new();
        let mut last_render: Option<Instant> = None;
        let mut dirty = false;
        let mut received = 0usize;

        loop {
            let flush_at = match (dirty, last_render) {
                (true, Some(at)) => Some(at + self.min_edit_interval),
                _ => None,
            };

            tokio::select! {
                biased;

                _ = sleep_until_or_never(flush_at) => {
                    output.render(&accumulated).await;
                    last_render = Some(Instant::now());
                    dirty = false;
                }

                next = fragments.next() => match next {
                    Some(Ok(StreamFragment::Complete(answer))) => {
                        received += 1;
                        output.render(&answer.text).await;
                        debug!(
                            %chat_id,
                            fragments = received,
                            pages = output.messages.len(),
                            failed_calls = output.failed_calls,
                            "answer projected"
                        );
                        return Ok(ProjectedAnswer {
                            answer,
                            messages: output.messages,
                            failed_calls: output.failed_calls,
                        });
                    }
                    Some(Ok(fragment)) => {
                        received += 1;
                        fragment.apply_to(&mut accumulated);
                        let due = match last_render {
                            None => true,
                            Some(at) => Instant::now() >= at + self.min_edit_interval,
                        };
                        if due {
                            output.render(&accumulated).await;
                            last_render = Some(Instant::now());
                            dirty = false;
                        } else {
                            dirty = true;
                        }
                    }
                    Some(Err(error)) => {
                        if dirty {
                            output.render(&accumulated).await;
                        }
                        warn!(
                            %chat_id,
                            fragments = received,
                            error = %error,
                            "answer stream failed"
                        );
                        return Err(error);
                    }
                    None => {
                        if dirty {
                            output.render(&accumulated).await;
                        }
                        warn!(
                            %chat_id,
                            fragments = received,
                            "answer stream ended without completion"
                        );
                        return Err(BackendError::Backend(
                            "answer stream ended before completion".to_string(),
                        ));
                    }
                },
            }
        }
    }
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Platform-side state of one projection.
struct LiveOutput<'a, P> {
    platform: &'a P,
    retry: &'a RetryPolicy,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    max_len: usize,
    messages: Vec<LiveMessage>,
    failed_calls: u32,
}

impl<P: ChatPlatform> LiveOutput<'_, P> {
    /// Bring the platform in line with `text`, skipping unchanged pages.
    async fn render(&mut self, text: &str) {
        let text = if text.is_empty() { PLACEHOLDER } else { text };
        let pages = paginate(text, self.max_len);
        let page_count = pages.len();
        let platform = self.platform;
        let chat_id = self.chat_id;

        for (index, page) in pages.into_iter().enumerate() {
            if let Some(message) = self.messages.get_mut(index) {
                if message.last_sent == page {
                    continue;
                }
                let message_id = message.message_id;
                let result = self
                    .retry
                    .run("edit_message", || platform.edit_message(chat_id, message_id, &page))
                    .await;
                match result {
                    Ok(()) | Err(PlatformError::NotModified) => message.last_sent = page,
                    Err(error) => {
                        self.failed_calls += 1;
                        warn!(%chat_id, %message_id, error = %error, "giving up on edit");
                    }
                }
            } else {
                let reply_to = self.reply_to;
                let result = self
                    .retry
                    .run("send_message", || platform.send_message(chat_id, reply_to, &page))
                    .await;
                match result {
                    Ok(message_id) => self.messages.push(LiveMessage {
                        chat_id,
                        message_id,
                        last_sent: page,
                    }),
                    Err(error) => {
                        // Later pages would land out of order; try again on the next render.
                        self.failed_calls += 1;
                        warn!(%chat_id, page = index, error = %error, "giving up on send");
                        break;
                    }
                }
            }
        }

        self.retire_pages_beyond(page_count).await;
    }

    /// Delete trailing messages a shorter text no longer fills, last first.
    async fn retire_pages_beyond(&mut self, page_count: usize) {
        let platform = self.platform;
        let chat_id = self.chat_id;

        while self.messages.len() > page_count {
            let Some(message_id) = self.messages.last().map(|m| m.message_id) else {
                break;
            };
            let result = self
                .retry
                .run("delete_message", || platform.delete_message(chat_id, message_id))
                .await;
            match result {
                Ok(()) => {
                    self.messages.pop();
                    debug!(%chat_id, %message_id, "retired surplus page");
                }
                Err(error) => {
                    // Kept in `messages` so the next render tries again.
                    self.failed_calls += 1;
                    warn!(%chat_id, %message_id, error = %error, "giving up on delete");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        Call, CallKind, FakePlatform, Step, complete, delta, scripted_stream, wait_ms,
    };

    const CHAT: ChatId = ChatId(7);
    const REPLY_TO: MessageId = MessageId(1);

    fn projector(platform: &Arc<FakePlatform>, interval_ms: u64) -> LiveProjector<FakePlatform> {
        LiveProjector::new(
            Arc::clone(platform),
            Duration::from_millis(interval_ms),
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(100)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello_scenario() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![
            delta("Hel"),
            wait_ms(10),
            delta("lo there"),
            wait_ms(10),
            complete("Hello there!", "conv", "msg"),
        ]);

        let projected = projector(&platform, 1000)
            .project(CHAT, Some(REPLY_TO), stream)
            .await
            .unwrap();

        assert_eq!(projected.answer.text, "Hello there!");
        assert_eq!(platform.sends(), vec!["Hel".to_string()]);
        assert_eq!(platform.edits(), vec!["Hello there!".to_string()]);
        assert_eq!(projected.messages.len(), 1);
        assert_eq!(projected.messages[0].last_sent, "Hello there!");
        match &platform.calls()[0] {
            Call::Send { reply_to, chat_id, .. } => {
                assert_eq!(*reply_to, Some(REPLY_TO));
                assert_eq!(*chat_id, CHAT);
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_text_equals_terminal_regardless_of_interval() {
        for interval in [0, 5, 50, 10_000] {
            let platform = Arc::new(FakePlatform::new());
            let stream = scripted_stream(vec![
                delta("a"),
                wait_ms(3),
                delta("b"),
                wait_ms(3),
                delta("c"),
                complete("abcd", "c", "m"),
            ]);
            projector(&platform, interval)
                .project(CHAT, None, stream)
                .await
                .unwrap();

            assert!(!platform.edits().is_empty(), "interval {interval}");
            assert_eq!(platform.texts().last().unwrap(), "abcd", "interval {interval}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_are_spaced_by_interval_except_terminal() {
        let platform = Arc::new(FakePlatform::new());
        let mut steps = Vec::new();
        for i in 0..50 {
            steps.push(delta(&format!("{i} ")));
            steps.push(wait_ms(37));
        }
        steps.push(complete("done", "c", "m"));

        projector(&platform, 200)
            .project(CHAT, None, scripted_stream(steps))
            .await
            .unwrap();

        let timed = platform.timed_calls();
        let (last_at, last_call) = timed.last().unwrap().clone();
        assert_eq!(
            last_call,
            Call::Edit {
                chat_id: CHAT,
                message_id: MessageId(100),
                text: "done".to_string()
            }
        );

        let render_times: Vec<Instant> =
            timed[..timed.len() - 1].iter().map(|(at, _)| *at).collect();
        assert!(render_times.len() > 2);
        for pair in render_times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
        // Coalescing: far fewer renders than fragments.
        assert!(render_times.len() < 20);
        assert!(last_at >= *render_times.last().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_text_is_flushed_by_timer() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![
            delta("one"),
            wait_ms(10),
            delta(" two"),
            wait_ms(500),
            complete("one two three", "c", "m"),
        ]);
        projector(&platform, 100)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(
            platform.texts(),
            vec!["one".to_string(), "one two".to_string(), "one two three".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_text_is_not_re_edited() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![
            delta("same"),
            wait_ms(300),
            delta(""),
            wait_ms(300),
            Step::Fragment(StreamFragment::Rewrite {
                text: "same".to_string(),
            }),
            wait_ms(300),
            complete("same", "c", "m"),
        ]);
        projector(&platform, 100)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(platform.sends(), vec!["same".to_string()]);
        assert!(platform.edits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_first_fragment_uses_placeholder() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![delta(""), wait_ms(5), complete("Hi", "c", "m")]);
        projector(&platform, 1000)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(platform.sends(), vec![PLACEHOLDER.to_string()]);
        assert_eq!(platform.edits(), vec!["Hi".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_splits_into_follow_up_messages() {
        let platform = Arc::new(FakePlatform::with_max_len(10));
        let stream = scripted_stream(vec![
            delta("0123456789"),
            wait_ms(5),
            complete("0123456789abcdefghij!", "c", "m"),
        ]);
        let projected = projector(&platform, 1000)
            .project(CHAT, Some(REPLY_TO), stream)
            .await
            .unwrap();

        assert_eq!(
            platform.sends(),
            vec!["0123456789".to_string(), "abcdefghij".to_string(), "!".to_string()]
        );
        assert!(platform.edits().is_empty());
        let pages: Vec<&str> = projected.messages.iter().map(|m| m.last_sent.as_str()).collect();
        assert_eq!(pages.concat(), "0123456789abcdefghij!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_rewrite_deletes_surplus_pages() {
        let platform = Arc::new(FakePlatform::with_max_len(10));
        let stream = scripted_stream(vec![
            delta("0123456789abc"),
            wait_ms(5),
            Step::Fragment(StreamFragment::Rewrite {
                text: "short".to_string(),
            }),
            wait_ms(5),
            complete("short", "c", "m"),
        ]);
        let projected = projector(&platform, 0)
            .project(CHAT, Some(REPLY_TO), stream)
            .await
            .unwrap();

        assert_eq!(platform.visible().concat(), "short");
        assert_eq!(platform.deleted(), vec![MessageId(101)]);
        assert_eq!(projected.messages.len(), 1);
        assert_eq!(projected.messages[0].last_sent, "short");
        assert_eq!(projected.failed_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_is_retried_on_final_render() {
        let platform = Arc::new(FakePlatform::with_max_len(10));
        platform.fail_next(
            CallKind::Delete,
            PlatformError::Api {
                code: 400,
                description: "Bad Request: message can't be deleted".to_string(),
            },
        );
        let stream = scripted_stream(vec![
            delta("0123456789abc"),
            wait_ms(5),
            Step::Fragment(StreamFragment::Rewrite {
                text: "short".to_string(),
            }),
            wait_ms(5),
            complete("short", "c", "m"),
        ]);
        let projected = projector(&platform, 0)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(projected.failed_calls, 1);
        assert_eq!(platform.visible(), vec!["short".to_string()]);
        assert_eq!(projected.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_edit_failure_is_retried() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_next(
            CallKind::Edit,
            PlatformError::RateLimited {
                retry_after: Some(Duration::from_millis(50)),
            },
        );
        let stream = scripted_stream(vec![delta("a"), complete("ab", "c", "m")]);
        let projected = projector(&platform, 1000)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(projected.failed_calls, 0);
        assert_eq!(platform.edits(), vec!["ab".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_edit_failure_does_not_abandon_stream() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_next(
            CallKind::Edit,
            PlatformError::Api {
                code: 400,
                description: "Bad Request".to_string(),
            },
        );
        let stream = scripted_stream(vec![
            delta("a"),
            wait_ms(150),
            delta("b"),
            wait_ms(150),
            complete("abc", "c", "m"),
        ]);
        let projected = projector(&platform, 100)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(projected.failed_calls, 1);
        assert_eq!(platform.texts().last().unwrap(), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_modified_counts_as_delivered() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_next(CallKind::Edit, PlatformError::NotModified);
        let stream = scripted_stream(vec![delta("a"), complete("ab", "c", "m")]);
        let projected = projector(&platform, 0)
            .project(CHAT, None, stream)
            .await
            .unwrap();

        assert_eq!(projected.failed_calls, 0);
        assert_eq!(projected.messages[0].last_sent, "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_flushes_pending_and_returns_error() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![
            delta("partial"),
            wait_ms(5),
            delta(" answer"),
            Step::Fail(BackendError::Network("connection reset".to_string())),
        ]);
        let err = projector(&platform, 1000)
            .project(CHAT, None, stream)
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::Network("connection reset".to_string()));
        assert_eq!(
            platform.texts(),
            vec!["partial".to_string(), "partial answer".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_before_any_fragment_sends_nothing() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![Step::Fail(BackendError::AuthExpired(
            "HTTP 401".to_string(),
        ))]);
        let err = projector(&platform, 1000)
            .project(CHAT, None, stream)
            .await
            .unwrap_err();

        assert!(err.is_auth_expired());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_without_completion_is_an_error() {
        let platform = Arc::new(FakePlatform::new());
        let stream = scripted_stream(vec![delta("dangling")]);
        let err = projector(&platform, 1000)
            .project(CHAT, None, stream)
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Backend(_)));
        assert_eq!(platform.sends(), vec!["dangling".to_string()]);
    }
}
