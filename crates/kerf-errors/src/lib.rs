//! Diagnostics shared by every stage of the template front end.

mod kind;
mod location;

use std::fmt::{self, Display};

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
/// The closed set of reportable problems.
pub use kind::ErrorKind;
/// Positions and regions inside a document.
pub use location::{SourceLocation, SourceSpan};
pub use text_size::{TextRange, TextSize};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    kind: ErrorKind,
    span: SourceSpan,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn at(kind: ErrorKind, location: SourceLocation, length: u32) -> Self {
        Self { kind, span: SourceSpan::at(location, length) }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> &SourceSpan {
        &self.span
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn range(&self) -> TextRange {
        self.span.range()
    }

    /// Attaches a file name to a diagnostic produced without one.
    pub fn with_file(mut self, file: Option<std::sync::Arc<str>>) -> Self {
        if self.span.file.is_none() {
            self.span.file = file;
        }
        self
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        RenderedDiagnostic { diagnostic: self, renderer, path, text }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self.span.location;
        if let Some(file) = &self.span.file {
            write!(f, "{file}")?;
        }
        write!(f, "({},{}): {}", location.line + 1, location.column + 1, self.kind)
    }
}

struct RenderedDiagnostic<'a> {
    diagnostic: &'a Diagnostic,
    renderer: &'a Renderer,
    path: &'a str,
    text: &'a str,
}

impl Display for RenderedDiagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.diagnostic.message();
        let range = clamp(self.diagnostic.range(), self.text);
        let message = Level::Error.title(&title).snippet(
            Snippet::source(self.text)
                .origin(self.path)
                .annotation(Level::Error.span(range.into()).label("here"))
                .fold(true),
        );
        write!(f, "{}", self.renderer.render(message))
    }
}

/// Keeps a range inside `text` so a stale diagnostic never panics the renderer.
fn clamp(range: TextRange, text: &str) -> TextRange {
    let len = TextSize::of(text);
    let start = range.start().min(len);
    let end = range.end().min(len);
    TextRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_one_based_positions() {
        let diagnostic =
            Diagnostic::at(ErrorKind::MissingEndTag("b".into()), SourceLocation::new(4, 0, 4), 1);
        assert_eq!(
            diagnostic.to_string(),
            "(1,5): element `b` was not closed; all elements must be either self-closing or have a matching end tag"
        );
    }

    #[test]
    fn render_points_at_range() {
        let text = "<a><b></a>";
        let diagnostic =
            Diagnostic::at(ErrorKind::MissingEndTag("b".into()), SourceLocation::new(4, 0, 4), 1);
        let rendered = diagnostic.render(&Renderer::plain(), "test.kerf", text).to_string();
        assert!(rendered.contains("element `b` was not closed"));
        assert!(rendered.contains("test.kerf"));
        assert!(rendered.contains("here"));
    }

    #[test]
    fn render_clamps_out_of_range_spans() {
        let diagnostic =
            Diagnostic::at(ErrorKind::UnterminatedComment, SourceLocation::new(40, 0, 40), 3);
        let rendered = diagnostic.render(&Renderer::plain(), "test.kerf", "@* x").to_string();
        assert!(rendered.contains("template comment"));
    }
}
