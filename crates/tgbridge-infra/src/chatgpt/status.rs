//! HTTP status mapping shared by the session exchange and conversation calls.

use reqwest::StatusCode;

use tgbridge_types::stream::BackendError;

/// Longest slice of an error body carried into the message.
const MAX_BODY_CHARS: usize = 200;

/// Map a non-success response to a [`BackendError`].
///
/// 401 and 403 mean the credential was rejected and become
/// [`BackendError::AuthExpired`]; everything else is a backend failure.
pub fn status_error(status: StatusCode, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::AuthExpired(format!("HTTP {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Backend(format!("rate limited (HTTP {status}), try again later"))
        }
        _ => {
            let body = body.trim();
            if body.is_empty() {
                BackendError::Backend(format!("HTTP {status}"))
            } else {
                let excerpt: String = body.chars().take(MAX_BODY_CHARS).collect();
                BackendError::Backend(format!("HTTP {status}: {excerpt}"))
            }
        }
    }
}
