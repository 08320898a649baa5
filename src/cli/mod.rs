//! Terminal front-end: argument parsing, logging setup, and the interactive
//! actions that drive the signup library.

pub mod actions;
pub mod callback;
pub mod commands;
pub mod dispatch;
pub mod prompt;
mod start;
pub mod telemetry;

pub use start::start;
