//! The template comment sub-protocol shared by both tokenizers.
//!
//! `@*` opens a comment and `*@` closes it. The tokens produced are
//! `RAZOR_COMMENT_TRANSITION`, `RAZOR_COMMENT_STAR`, an optional
//! `RAZOR_COMMENT_LITERAL`, `RAZOR_COMMENT_STAR`, `RAZOR_COMMENT_TRANSITION`.
//! An unterminated comment ends with a literal (possibly empty) carrying the
//! diagnostic.

use kerf_errors::ErrorKind;

use crate::SyntaxKind::*;
use crate::{SeekableSource, Token, finish_token};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum CommentState {
    #[default]
    Outside,
    Star,
    Body,
    EndStar,
    EndTransition,
}

/// True when the source sits on `@*`.
pub(crate) fn at_comment_start(source: &SeekableSource) -> bool {
    source.peek() == Some('@') && source.peek_nth(1) == Some('*')
}

/// Consumes the `@` of `@*` and enters the comment.
pub(crate) fn start(state: &mut CommentState, source: &mut SeekableSource) -> Token {
    let start = source.position();
    source.advance();
    *state = CommentState::Star;
    finish_token(source, start, RAZOR_COMMENT_TRANSITION)
}

/// Produces the next comment token while inside a comment.
pub(crate) fn next_token(state: &mut CommentState, source: &mut SeekableSource) -> Option<Token> {
    let start = source.position();
    let kind = match *state {
        CommentState::Outside => return None,
        CommentState::Star => {
            source.advance();
            *state = CommentState::Body;
            RAZOR_COMMENT_STAR
        }
        CommentState::Body => match source.remaining().find("*@") {
            Some(0) => {
                *state = CommentState::EndStar;
                return next_token(state, source);
            }
            Some(len) => {
                source.seek(start + len);
                *state = CommentState::EndStar;
                RAZOR_COMMENT_LITERAL
            }
            None => {
                source.seek(source.len());
                *state = CommentState::Outside;
                let token = finish_token(source, start, RAZOR_COMMENT_LITERAL);
                return Some(token.with_diagnostic(ErrorKind::UnterminatedComment, source.file()));
            }
        },
        CommentState::EndStar => {
            source.advance();
            *state = CommentState::EndTransition;
            RAZOR_COMMENT_STAR
        }
        CommentState::EndTransition => {
            source.advance();
            *state = CommentState::Outside;
            RAZOR_COMMENT_TRANSITION
        }
    };

    Some(finish_token(source, start, kind))
}
