//! In-memory fakes of the platform, backend and session provider.
//!
//! Each fake records what it was asked to do so tests can assert on the
//! exact sequence of outbound calls.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use tgbridge_types::chat::{ChatId, Continuation, MessageId};
use tgbridge_types::error::{PlatformError, SessionError};
use tgbridge_types::stream::{BackendError, CompletedAnswer, StreamFragment};

use crate::backend::{ConversationBackend, ExchangeRequest, FragmentStream};
use crate::platform::ChatPlatform;
use crate::session::SessionProvider;

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send {
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        message_id: MessageId,
        text: String,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
    Delete {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Typing {
        chat_id: ChatId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Send,
    Edit,
    Delete,
}

/// Recording fake of [`ChatPlatform`].
pub struct FakePlatform {
    max_len: usize,
    next_id: AtomicU32,
    calls: Mutex<Vec<(Instant, Call)>>,
    failures: Mutex<VecDeque<(CallKind, PlatformError)>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::with_max_len(4096)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            next_id: AtomicU32::new(100),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Make the next call of `kind` fail with `error` (queued in order).
    pub fn fail_next(&self, kind: CallKind, error: PlatformError) {
        self.failures.lock().unwrap().push_back((kind, error));
    }

    fn take_failure(&self, kind: CallKind) -> Option<PlatformError> {
        let mut failures = self.failures.lock().unwrap();
        let due = matches!(failures.front(), Some((k, _)) if *k == kind);
        if due {
            failures.pop_front().map(|(_, e)| e)
        } else {
            None
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of every send and edit, in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } | Call::Edit { text, .. } => Some(text),
                Call::Delete { .. } | Call::Typing { .. } => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    /// Text currently visible in each message that was sent and not deleted,
    /// in send order.
    pub fn visible(&self) -> Vec<String> {
        let mut pages: Vec<(MessageId, String)> = Vec::new();
        for call in self.calls() {
            match call {
                Call::Send { message_id, text, .. } => pages.push((message_id, text)),
                Call::Edit { message_id, text, .. } => {
                    if let Some(page) = pages.iter_mut().find(|(id, _)| *id == message_id) {
                        page.1 = text;
                    }
                }
                Call::Delete { message_id, .. } => pages.retain(|(id, _)| *id != message_id),
                Call::Typing { .. } => {}
            }
        }
        pages.into_iter().map(|(_, text)| text).collect()
    }

    pub fn sends(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ChatPlatform for FakePlatform {
    fn max_message_len(&self) -> usize {
        self.max_len
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        if let Some(err) = self.take_failure(CallKind::Send) {
            return Err(err);
        }
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) as i64);
        self.calls.lock().unwrap().push((
            Instant::now(),
            Call::Send {
                chat_id,
                reply_to,
                message_id,
                text: text.to_string(),
            },
        ));
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError> {
        if let Some(err) = self.take_failure(CallKind::Edit) {
            return Err(err);
        }
        self.calls.lock().unwrap().push((
            Instant::now(),
            Call::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            },
        ));
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), PlatformError> {
        if let Some(err) = self.take_failure(CallKind::Delete) {
            return Err(err);
        }
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), Call::Delete { chat_id, message_id }));
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), PlatformError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), Call::Typing { chat_id }));
        Ok(())
    }
}

/// One step of a scripted backend answer.
#[derive(Debug, Clone)]
pub enum Step {
    Wait(Duration),
    Fragment(StreamFragment),
    Fail(BackendError),
}

pub fn delta(text: &str) -> Step {
    Step::Fragment(StreamFragment::delta(text))
}

pub fn wait_ms(ms: u64) -> Step {
    Step::Wait(Duration::from_millis(ms))
}

pub fn complete(text: &str, conversation_id: &str, message_id: &str) -> Step {
    Step::Fragment(StreamFragment::Complete(CompletedAnswer {
        text: text.to_string(),
        conversation_id: conversation_id.to_string(),
        message_id: message_id.to_string(),
    }))
}

/// Turn a script into a fragment stream.
pub fn scripted_stream(steps: Vec<Step>) -> FragmentStream {
    Box::pin(async_stream::stream! {
        for step in steps {
            match step {
                Step::Wait(d) => tokio::time::sleep(d).await,
                Step::Fragment(f) => yield Ok(f),
                Step::Fail(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

/// What the backend was asked, minus the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub chat_id: ChatId,
    pub prompt: String,
    pub credential: String,
    pub continuation: Continuation,
}

/// Scripted fake of [`ConversationBackend`], keyed by prompt.
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Vec<Step>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue the answer for the next request carrying `prompt`.
    pub fn script(&self, prompt: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(prompt.to_string())
            .or_default()
            .push_back(steps);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ConversationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn send(&self, request: ExchangeRequest) -> FragmentStream {
        self.requests.lock().unwrap().push(RecordedRequest {
            chat_id: request.chat_id,
            prompt: request.prompt.clone(),
            credential: request.credential.expose_secret().to_string(),
            continuation: request.continuation.clone(),
        });
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.prompt)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                vec![Step::Fail(BackendError::Backend(format!(
                    "no script for prompt '{}'",
                    request.prompt
                )))]
            });
        scripted_stream(steps)
    }
}

/// In-memory [`SessionProvider`].
pub struct MemorySessions {
    token: Mutex<Option<String>>,
    acquirable: Option<String>,
    pub acquisitions: AtomicU32,
}

impl MemorySessions {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: Mutex::new(token.map(str::to_string)),
            acquirable: None,
            acquisitions: AtomicU32::new(0),
        }
    }

    /// Let `acquire_session` hand out `token`.
    pub fn with_acquirable(mut self, token: &str) -> Self {
        self.acquirable = Some(token.to_string());
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

impl SessionProvider for MemorySessions {
    async fn acquire_session(&self) -> Result<SecretString, SessionError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.acquirable
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| SessionError::Unavailable("nothing to acquire".to_string()))
    }

    async fn persist_token(&self, token: &str) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn current_token(&self) -> Option<SecretString> {
        self.token.lock().unwrap().clone().map(SecretString::from)
    }
}
