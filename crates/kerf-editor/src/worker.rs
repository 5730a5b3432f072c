//! The background side of [`DocumentParser`](crate::DocumentParser).

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use kerf_parse::{parse_source, rewrite, tag_helper_prefix};
use kerf_syntax::{SyntaxTree, TagBinding, TagDescriptorProvider, TextChange};
use kerf_tokenizer::SeekableSource;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace};

use crate::{EditorConfig, ParseCompleted, trees_are_different};

/// State shared between the caller and the worker, always behind one lock.
#[derive(Debug)]
pub(crate) struct State {
    /// The buffer every queued change has been applied to.
    pub(crate) buffer: Arc<str>,
    /// The latest published tree; the baseline queued changes are relative to.
    pub(crate) tree: Option<Arc<SyntaxTree>>,
    /// Changes since `tree`, including ones whose reparse was cancelled.
    pub(crate) pending: Vec<TextChange>,
    /// Cancels the reparse in flight.
    pub(crate) in_flight: Option<CancellationToken>,
    /// Set from queueing until a reparse is published.
    pub(crate) reparsing: bool,
    pub(crate) version: u64,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) config: EditorConfig,
    pub(crate) shutdown: CancellationToken,
}

/// What one reparse works on, copied out of [`State`].
struct Job {
    buffer: Arc<str>,
    previous: Option<Arc<SyntaxTree>>,
    changes: Vec<TextChange>,
    cancel: CancellationToken,
    version: u64,
}

pub(crate) fn run(shared: &Shared, work: &Receiver<()>, completed: &Sender<ParseCompleted>) {
    info!("reparse worker started");
    while work.recv().is_ok() {
        // Coalesce signals that piled up while the last reparse ran.
        while work.try_recv().is_ok() {}
        if shared.shutdown.is_cancelled() {
            break;
        }

        let Some(job) = take_job(shared) else {
            continue;
        };
        let _span = info_span!("reparse", version = job.version).entered();
        match reparse(shared, &job) {
            Some(event) => {
                if completed.send(event).is_err() {
                    trace!("nobody listens for completions");
                }
            }
            None => debug!("reparse cancelled"),
        }
    }
    info!("reparse worker stopped");
}

fn take_job(shared: &Shared) -> Option<Job> {
    let mut state = shared.state.lock();
    if !state.reparsing {
        return None;
    }
    if let Some(token) = state.in_flight.take() {
        token.cancel();
    }
    let cancel = shared.shutdown.child_token();
    state.in_flight = Some(cancel.clone());
    Some(Job {
        buffer: Arc::clone(&state.buffer),
        previous: state.tree.clone(),
        changes: state.pending.clone(),
        cancel,
        version: state.version,
    })
}

fn reparse(shared: &Shared, job: &Job) -> Option<ParseCompleted> {
    let config = &shared.config;
    let source = SeekableSource::new(Arc::clone(&job.buffer)).with_file(config.file_name.clone());
    let parsed = parse_source(source, config.options.clone(), Some(job.cancel.clone()))?;

    let prefix =
        tag_helper_prefix(&parsed).or_else(|| config.options.tag_helper_prefix.clone());
    let tree = match prefix {
        Some(prefix) => {
            let provider = Prefixed { inner: config.descriptors.as_ref(), prefix };
            rewrite(&parsed, &provider, config.file_name.as_ref())
        }
        None => rewrite(&parsed, config.descriptors.as_ref(), config.file_name.as_ref()),
    };
    if job.cancel.is_cancelled() {
        return None;
    }

    let structure_changed = match &job.previous {
        Some(previous) => trees_are_different(previous, &tree, &job.changes),
        None => true,
    };
    let tree = Arc::new(tree);

    let mut state = shared.state.lock();
    // A newer edit cancels under this lock, so the check cannot race it.
    if job.cancel.is_cancelled() {
        return None;
    }
    state.tree = Some(Arc::clone(&tree));
    state.pending.clear();
    state.in_flight = None;
    state.reparsing = false;
    drop(state);

    debug!(structure_changed, changes = job.changes.len(), "reparse published");
    Some(ParseCompleted {
        tree,
        buffer: Arc::clone(&job.buffer),
        change: job.changes.last().cloned(),
        tree_structure_changed: structure_changed,
        version: job.version,
    })
}

/// Strips a tag-helper prefix before asking the host's provider.
struct Prefixed<'a> {
    inner: &'a dyn TagDescriptorProvider,
    prefix: String,
}

impl Prefixed<'_> {
    fn strip<'n>(&self, name: &'n str) -> Option<&'n str> {
        let head = name.get(..self.prefix.len())?;
        let rest = name.get(self.prefix.len()..)?;
        (head.eq_ignore_ascii_case(&self.prefix) && !rest.is_empty()).then_some(rest)
    }
}

impl TagDescriptorProvider for Prefixed<'_> {
    fn binding(
        &self,
        tag_name: &str,
        attributes: &[(String, String)],
        parent_tag: Option<&str>,
        parent_is_bound: bool,
    ) -> Option<TagBinding> {
        let name = self.strip(tag_name)?;
        let parent = parent_tag.map(|parent| self.strip(parent).unwrap_or(parent));
        let mut binding = self.inner.binding(name, attributes, parent, parent_is_bound)?;
        binding.tag_name = tag_name.to_owned();
        Some(binding)
    }
}
