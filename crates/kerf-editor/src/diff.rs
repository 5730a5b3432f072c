use kerf_syntax::{SyntaxTree, TextChange};
use tracing::{trace, warn};

/// Decides whether a full reparse changed the document's structure.
///
/// Each change is replayed on `previous` by forcing it into its owning span.
/// The trees differ when a change has no owner or when the replayed tree is not
/// equivalent to `current`.
pub fn trees_are_different(
    previous: &SyntaxTree,
    current: &SyntaxTree,
    changes: &[TextChange],
) -> bool {
    let mut replayed = previous.clone();
    for change in changes {
        let Some(owner) = replayed.locate_owner(change) else {
            warn!(position = change.old_position, "no span owns the change");
            return true;
        };
        let Some(span) = owner.as_span() else {
            return true;
        };
        let Some(edited) = span.edit_handler().apply_change(span, change, true).span else {
            trace!(position = change.old_position, "change does not fit its owner");
            return true;
        };
        replayed = replayed.with_replaced_span(owner, edited);
    }
    !replayed.root_block().equivalent_to(current.root_block())
}
