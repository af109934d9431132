//! Binary-side orchestration: configuration, terminal output and the run loop.

pub(crate) mod config;
pub(crate) mod input;
pub(crate) mod progress;
pub(crate) mod runtime;
pub(crate) mod terminal;
