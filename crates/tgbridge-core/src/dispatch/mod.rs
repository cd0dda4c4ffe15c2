//! Inbound update handling: authorization, routing and conversational turns.

pub mod handler;
pub mod replies;
pub mod route;

pub use handler::{Dispatcher, ExchangeError};
pub use route::{Command, Route, classify};
