use kerf_errors::ErrorKind;

use crate::SyntaxKind::{self, *};
use crate::comment::{self, CommentState};
use crate::{
    Keyword, Language, SeekableSource, Token, Tokenize, eat_newline_tail, finish_token,
    is_identifier_part, is_identifier_start, is_newline, is_whitespace,
};

#[derive(Debug, Clone, Default)]
pub struct CodeTokenizer {
    comment: CommentState,
}

impl Tokenize for CodeTokenizer {
    const LANGUAGE: Language = Language::Code;

    fn next_token(&mut self, source: &mut SeekableSource) -> Option<Token> {
        if let Some(token) = comment::next_token(&mut self.comment, source) {
            return Some(token);
        }

        if comment::at_comment_start(source) {
            return Some(comment::start(&mut self.comment, source));
        }

        let start = source.position();
        let mut error = None;
        let kind = match source.advance()? {
            '@' => match (source.peek(), source.peek_nth(1)) {
                (Some('"'), _) => {
                    source.advance();
                    error = verbatim_string(source);
                    STRING_LITERAL
                }
                (Some('$'), Some('"')) => {
                    source.advance();
                    source.advance();
                    error = verbatim_string(source);
                    STRING_LITERAL
                }
                _ => TRANSITION,
            },
            '$' if source.peek() == Some('"') => {
                source.advance();
                error = quoted(source, '"');
                STRING_LITERAL
            }
            '$' if source.peek() == Some('@') && source.peek_nth(1) == Some('"') => {
                source.advance();
                source.advance();
                error = verbatim_string(source);
                STRING_LITERAL
            }
            '"' => {
                error = quoted(source, '"');
                STRING_LITERAL
            }
            '\'' => {
                error = quoted(source, '\'');
                CHARACTER_LITERAL
            }
            c if is_identifier_start(c) => {
                source.advance_while(is_identifier_part);
                let keyword = Keyword::from_text(source.slice(start, source.position()));
                let kind = if keyword.is_some() { KEYWORD } else { IDENTIFIER };
                let mut token = finish_token(source, start, kind);
                token.keyword = keyword;
                return Some(token);
            }
            c @ '0'..='9' => number(source, c),
            '.' if source.peek().is_some_and(|c| c.is_ascii_digit()) => number(source, '.'),
            '/' if source.peek() == Some('/') => {
                source.advance_while(|c| !is_newline(c));
                COMMENT
            }
            '/' if source.peek() == Some('*') => {
                source.advance();
                match source.remaining().find("*/") {
                    Some(len) => source.seek(source.position() + len + 2),
                    None => {
                        source.seek(source.len());
                        error = Some(ErrorKind::UnterminatedBlockComment);
                    }
                }
                COMMENT
            }
            c if is_newline(c) => {
                eat_newline_tail(source, c);
                NEW_LINE
            }
            c if is_whitespace(c) => {
                source.advance_while(is_whitespace);
                WHITESPACE
            }
            c => operator(source, c),
        };

        let token = finish_token(source, start, kind);
        Some(match error {
            Some(error) => token.with_diagnostic(error, source.file()),
            None => token,
        })
    }

    fn reset(&mut self) {
        self.comment = CommentState::Outside;
    }
}

/// Reads the rest of a `"` or `'` delimited literal; backslash escapes the next character.
fn quoted(source: &mut SeekableSource, quote: char) -> Option<ErrorKind> {
    loop {
        match source.peek() {
            Some(c) if c == quote => {
                source.advance();
                return None;
            }
            Some('\\') => {
                source.advance();
                if source.peek().is_some_and(|c| !is_newline(c)) {
                    source.advance();
                }
            }
            Some(c) if !is_newline(c) => {
                source.advance();
            }
            _ => {
                return Some(if quote == '"' {
                    ErrorKind::UnterminatedString
                } else {
                    ErrorKind::UnterminatedChar
                });
            }
        }
    }
}

/// Reads the rest of a verbatim string; `""` is an escaped quote and newlines are allowed.
fn verbatim_string(source: &mut SeekableSource) -> Option<ErrorKind> {
    loop {
        match source.advance() {
            Some('"') => {
                if !source.eat('"') {
                    return None;
                }
            }
            Some(_) => {}
            None => return Some(ErrorKind::UnterminatedString),
        }
    }
}

fn number(source: &mut SeekableSource, first: char) -> SyntaxKind {
    if first == '0' && matches!(source.peek(), Some('x' | 'X')) {
        source.advance();
        source.advance_while(|c| c.is_ascii_hexdigit());
        integer_suffix(source);
        return INTEGER_LITERAL;
    }

    let mut real = first == '.';
    source.advance_while(|c| c.is_ascii_digit());

    if !real
        && source.peek() == Some('.')
        && source.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        source.advance();
        source.advance_while(|c| c.is_ascii_digit());
        real = true;
    }

    if matches!(source.peek(), Some('e' | 'E')) {
        let digit_at = if matches!(source.peek_nth(1), Some('+' | '-')) { 2 } else { 1 };
        if source.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
            for _ in 0..digit_at {
                source.advance();
            }
            source.advance_while(|c| c.is_ascii_digit());
            real = true;
        }
    }

    if matches!(source.peek(), Some('f' | 'F' | 'd' | 'D' | 'm' | 'M')) {
        source.advance();
        return REAL_LITERAL;
    }

    if real {
        return REAL_LITERAL;
    }

    integer_suffix(source);
    INTEGER_LITERAL
}

fn integer_suffix(source: &mut SeekableSource) {
    match source.peek() {
        Some('u' | 'U') => {
            source.advance();
            if matches!(source.peek(), Some('l' | 'L')) {
                source.advance();
            }
        }
        Some('l' | 'L') => {
            source.advance();
            if matches!(source.peek(), Some('u' | 'U')) {
                source.advance();
            }
        }
        _ => {}
    }
}

/// Operators dispatched on the first character, extended by the second.
fn operator(source: &mut SeekableSource, first: char) -> SyntaxKind {
    let second = source.peek();
    let (kind, len) = match (first, second) {
        ('{', _) => (LEFT_BRACE, 1),
        ('}', _) => (RIGHT_BRACE, 1),
        ('(', _) => (LEFT_PAREN, 1),
        (')', _) => (RIGHT_PAREN, 1),
        ('[', _) => (LEFT_BRACKET, 1),
        (']', _) => (RIGHT_BRACKET, 1),
        (',', _) => (COMMA, 1),
        (';', _) => (SEMICOLON, 1),
        ('.', _) => (DOT, 1),
        ('~', _) => (TILDE, 1),
        ('#', _) => (HASH, 1),
        ('!', Some('=')) => (NOT_EQUALS, 2),
        ('!', _) => (BANG, 1),
        ('%', Some('=')) => (PERCENT_ASSIGN, 2),
        ('%', _) => (PERCENT, 1),
        ('&', Some('&')) => (DOUBLE_AND, 2),
        ('&', Some('=')) => (AND_ASSIGN, 2),
        ('&', _) => (AND, 1),
        ('*', Some('=')) => (STAR_ASSIGN, 2),
        ('*', _) => (STAR, 1),
        ('+', Some('+')) => (INCREMENT, 2),
        ('+', Some('=')) => (PLUS_ASSIGN, 2),
        ('+', _) => (PLUS, 1),
        ('-', Some('-')) => (DECREMENT, 2),
        ('-', Some('=')) => (MINUS_ASSIGN, 2),
        ('-', Some('>')) => (ARROW, 2),
        ('-', _) => (MINUS, 1),
        ('/', Some('=')) => (SLASH_ASSIGN, 2),
        ('/', _) => (FORWARD_SLASH, 1),
        (':', Some(':')) => (DOUBLE_COLON, 2),
        (':', _) => (COLON, 1),
        ('<', Some('=')) => (LESS_THAN_EQUALS, 2),
        ('<', Some('<')) if source.peek_nth(1) == Some('=') => (LEFT_SHIFT_ASSIGN, 3),
        ('<', Some('<')) => (LEFT_SHIFT, 2),
        ('<', _) => (LESS_THAN, 1),
        ('=', Some('=')) => (DOUBLE_EQUALS, 2),
        ('=', Some('>')) => (ARROW, 2),
        ('=', _) => (EQUALS, 1),
        ('>', Some('=')) => (GREATER_THAN_EQUALS, 2),
        ('>', _) => (GREATER_THAN, 1),
        ('?', Some('?')) => (NULL_COALESCE, 2),
        ('?', _) => (QUESTION_MARK, 1),
        ('^', Some('=')) => (XOR_ASSIGN, 2),
        ('^', _) => (XOR, 1),
        ('|', Some('|')) => (DOUBLE_OR, 2),
        ('|', Some('=')) => (OR_ASSIGN, 2),
        ('|', _) => (OR, 1),
        _ => (UNKNOWN, 1),
    };

    for _ in 1..len {
        source.advance();
    }

    kind
}
