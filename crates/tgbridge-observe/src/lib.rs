//! Observability for tgbridge: subscriber setup and shared span vocabulary.

pub mod fields;
pub mod tracing_setup;
