//! SessionProvider trait definition.
//!
//! The backend credential is owned by a single provider. How a session is
//! acquired (environment, browser automation, manual entry) is up to the
//! implementation; the bridge only reads the current token and stores new
//! ones.

use std::future::Future;

use secrecy::SecretString;

use tgbridge_types::error::SessionError;

/// Source and store of the backend session token.
pub trait SessionProvider: Send + Sync {
    /// Obtain a fresh session token out-of-band.
    fn acquire_session(&self) -> impl Future<Output = Result<SecretString, SessionError>> + Send;

    /// Make `token` the active credential and persist it.
    fn persist_token(&self, token: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// The active credential, if any.
    fn current_token(&self) -> Option<SecretString>;
}
