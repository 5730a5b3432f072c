use crate::SyntaxKind::{self, *};
use crate::comment::{self, CommentState};
use crate::{
    Language, SeekableSource, Token, Tokenize, eat_newline_tail, finish_token, is_newline,
    is_whitespace,
};

#[derive(Debug, Clone, Default)]
pub struct MarkupTokenizer {
    comment: CommentState,
}

impl Tokenize for MarkupTokenizer {
    const LANGUAGE: Language = Language::Markup;

    fn next_token(&mut self, source: &mut SeekableSource) -> Option<Token> {
        if let Some(token) = comment::next_token(&mut self.comment, source) {
            return Some(token);
        }

        if comment::at_comment_start(source) {
            return Some(comment::start(&mut self.comment, source));
        }

        let start = source.position();
        let kind = match source.advance()? {
            '@' => TRANSITION,
            '<' => OPEN_ANGLE,
            '>' => CLOSE_ANGLE,
            '!' => BANG,
            '/' => FORWARD_SLASH,
            '?' => QUESTION_MARK,
            '[' => LEFT_BRACKET,
            ']' => RIGHT_BRACKET,
            '=' => EQUALS,
            '"' => DOUBLE_QUOTE,
            '\'' => SINGLE_QUOTE,
            ':' => COLON,
            '-' if source.peek() == Some('-') => {
                source.advance();
                DOUBLE_HYPHEN
            }
            c if is_newline(c) => {
                eat_newline_tail(source, c);
                NEW_LINE
            }
            c if is_whitespace(c) => {
                source.advance_while(is_whitespace);
                WHITESPACE
            }
            c => text(source, c),
        };

        Some(finish_token(source, start, kind))
    }

    fn reset(&mut self) {
        self.comment = CommentState::Outside;
    }
}

/// Batches characters into `TEXT` until whitespace or punctuation.
///
/// An `@` between two alphanumeric characters stays in the text, so that
/// e-mail addresses are not read as transitions.
fn text(source: &mut SeekableSource, first: char) -> SyntaxKind {
    let mut previous = first;
    while let Some(c) = source.peek() {
        if is_whitespace(c) || is_newline(c) {
            break;
        }
        match c {
            '<' | '>' | '!' | '/' | '?' | '[' | ']' | '=' | '"' | '\'' | ':' => break,
            '-' if source.peek_nth(1) == Some('-') => break,
            '@' => {
                let next = source.peek_nth(1);
                if !previous.is_alphanumeric() || !next.is_some_and(char::is_alphanumeric) {
                    break;
                }
            }
            _ => {}
        }
        previous = c;
        source.advance();
    }
    TEXT
}
