use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use kerf_syntax::{PartialParseResult, SyntaxTree, TextChange};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::worker::{self, Shared, State};
use crate::{EditorConfig, EditorError};

/// Published by the worker after each full reparse that was not cancelled.
#[derive(Debug, Clone)]
pub struct ParseCompleted {
    pub tree: Arc<SyntaxTree>,
    /// The text `tree` was parsed from.
    pub buffer: Arc<str>,
    /// The last edit the reparse covers; `None` for the initial parse.
    pub change: Option<TextChange>,
    pub tree_structure_changed: bool,
    pub version: u64,
}

/// Parses one open document and keeps the tree current as edits arrive.
///
/// Edits are applied to the owning span when its edit handler accepts them;
/// otherwise they are queued for a worker thread that reparses the whole
/// buffer. A queued edit cancels the reparse in flight and is merged with
/// every edit that reparse covered.
pub struct DocumentParser {
    shared: Arc<Shared>,
    work: Option<Sender<()>>,
    completed: Receiver<ParseCompleted>,
    worker: Option<JoinHandle<()>>,
    /// Node index of the span that accepted the last partial parse.
    last_owner: Option<usize>,
    last_result: Option<PartialParseResult>,
}

impl DocumentParser {
    /// Starts the worker and queues the initial parse of `text`.
    pub fn new(text: &str, config: EditorConfig) -> Result<Self, EditorError> {
        let (work, work_receiver) = crossbeam_channel::unbounded();
        let (completed_sender, completed) = crossbeam_channel::unbounded();
        let state = State {
            buffer: Arc::from(text),
            tree: None,
            pending: Vec::new(),
            in_flight: None,
            reparsing: true,
            version: 0,
        };
        let shutdown = CancellationToken::new();
        let shared = Arc::new(Shared { state: Mutex::new(state), config, shutdown });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("kerf-reparse".to_owned())
            .spawn(move || worker::run(&worker_shared, &work_receiver, &completed_sender))
            .map_err(EditorError::Spawn)?;

        let parser = Self {
            shared,
            work: Some(work),
            completed,
            worker: Some(worker),
            last_owner: None,
            last_result: None,
        };
        parser.signal()?;
        Ok(parser)
    }

    /// Completion events, in publication order.
    pub fn completions(&self) -> &Receiver<ParseCompleted> {
        &self.completed
    }

    /// The latest tree, from a reparse or a partial parse.
    pub fn tree(&self) -> Option<Arc<SyntaxTree>> {
        self.shared.state.lock().tree.clone()
    }

    /// The buffer with every edit applied.
    pub fn text(&self) -> Arc<str> {
        Arc::clone(&self.shared.state.lock().buffer)
    }

    pub fn is_reparsing(&self) -> bool {
        self.shared.state.lock().reparsing
    }

    pub fn config(&self) -> &EditorConfig {
        &self.shared.config
    }

    /// Applies `change`, in place if the owning span accepts it.
    ///
    /// Returns the edit handler's verdict. `REJECTED` means a full reparse was
    /// queued and its result will arrive on [`completions`](Self::completions).
    pub fn apply_edit(&mut self, change: TextChange) -> Result<PartialParseResult, EditorError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(EditorError::ShutDown);
        }
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state.lock();
        let Some(buffer) = change.apply_to_buffer(&state.buffer) else {
            return Err(EditorError::OutOfBounds {
                start: change.old_position,
                end: change.old_end(),
                length: state.buffer.len(),
            });
        };
        let change = change.normalize();
        trace!(?change, "edit");

        let mut result = PartialParseResult::REJECTED;
        if let Some(tree) = state.tree.clone().filter(|_| !state.reparsing) {
            let (verdict, edited) = self.partial_parse(&tree, &change);
            if let Some(edited) = edited {
                state.tree = Some(Arc::new(edited));
                state.buffer = Arc::from(buffer);
                state.version += 1;
                return Ok(verdict);
            }
            result = verdict;
        }

        self.last_owner = None;
        self.last_result = None;
        state.pending.push(change);
        state.buffer = Arc::from(buffer);
        state.version += 1;
        if let Some(token) = state.in_flight.take() {
            debug!(version = state.version, "cancelling reparse in flight");
            token.cancel();
        }
        state.reparsing = true;
        drop(state);

        self.signal()?;
        Ok(result)
    }

    /// Queues a full reparse of the unchanged buffer.
    pub fn force_reparse(&mut self) -> Result<(), EditorError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(EditorError::ShutDown);
        }
        let mut state = self.shared.state.lock();
        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
        state.reparsing = true;
        drop(state);
        self.signal()
    }

    fn partial_parse(
        &mut self,
        tree: &SyntaxTree,
        change: &TextChange,
    ) -> (PartialParseResult, Option<SyntaxTree>) {
        let cached = self.last_owner.and_then(|index| tree.node(index)).filter(|node| {
            node.as_span().is_some_and(|span| span.edit_handler().owns_change(span, change))
        });
        let Some(owner) = cached.or_else(|| tree.locate_owner(change)) else {
            warn!(position = change.old_position, "no span owns the change");
            return (PartialParseResult::REJECTED, None);
        };

        // A provisional edit must settle before another span is edited.
        let provisional = self.last_result.is_some_and(PartialParseResult::is_provisional);
        if provisional && self.last_owner != Some(owner.index()) {
            debug!("leaving a provisional span");
            return (PartialParseResult::REJECTED, None);
        }

        let Some(span) = owner.as_span() else {
            return (PartialParseResult::REJECTED, None);
        };
        let edit = span.edit_handler().apply_change(span, change, false);
        debug!(accepted = ?edit.result, owner = owner.index(), "partial parse");

        match edit.span {
            Some(edited) if edit.result.is_accepted() => {
                self.last_owner = Some(owner.index());
                self.last_result = Some(edit.result);
                (edit.result, Some(tree.with_replaced_span(owner, edited)))
            }
            _ => (edit.result, None),
        }
    }

    fn signal(&self) -> Result<(), EditorError> {
        let work = self.work.as_ref().ok_or(EditorError::ShutDown)?;
        if work.send(()).is_err() {
            return Err(EditorError::ShutDown);
        }
        Ok(())
    }

    /// Stops the worker, discarding any reparse in flight.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.cancel();
        self.work = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("reparse worker panicked");
            }
        }
    }
}

impl Drop for DocumentParser {
    fn drop(&mut self) {
        self.shutdown();
    }
}
