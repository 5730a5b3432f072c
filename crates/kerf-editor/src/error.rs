use thiserror::Error;

/// Misuse of a [`DocumentParser`](crate::DocumentParser) by its host.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("the document parser has been shut down")]
    ShutDown,
    #[error("edit {start}..{end} does not fit the {length}-byte buffer")]
    OutOfBounds { start: usize, end: usize, length: usize },
    #[error("failed to start the reparse worker")]
    Spawn(#[source] std::io::Error),
}
