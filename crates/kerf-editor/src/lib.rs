//! Keeps a parsed document up to date while it is being edited.
//!
//! Small edits are applied to the owning span in place. Everything else is
//! queued for a worker thread that reparses the whole buffer and publishes a
//! [`ParseCompleted`] event.

mod config;
mod diff;
mod document;
mod error;
#[cfg(test)]
mod tests;
mod worker;

pub use config::EditorConfig;
pub use diff::trees_are_different;
pub use document::{DocumentParser, ParseCompleted};
pub use error::EditorError;
