/// Token kinds for both languages.
///
/// The markup and code tokenizers draw from disjoint parts of this enum except
/// for the shared kinds at the top.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[repr(u16)]
pub enum SyntaxKind {
    WHITESPACE,
    NEW_LINE,
    TRANSITION,
    RAZOR_COMMENT_TRANSITION,
    RAZOR_COMMENT_STAR,
    RAZOR_COMMENT_LITERAL,
    BANG,
    FORWARD_SLASH,
    QUESTION_MARK,
    LEFT_BRACKET,
    RIGHT_BRACKET,
    EQUALS,
    COLON,
    MARKER,
    UNKNOWN,

    // Markup.
    TEXT,
    OPEN_ANGLE,
    CLOSE_ANGLE,
    DOUBLE_HYPHEN,
    DOUBLE_QUOTE,
    SINGLE_QUOTE,

    // Code.
    IDENTIFIER,
    KEYWORD,
    INTEGER_LITERAL,
    REAL_LITERAL,
    CHARACTER_LITERAL,
    STRING_LITERAL,
    COMMENT,
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    SEMICOLON,
    DOT,
    DOUBLE_COLON,
    NULL_COALESCE,
    TILDE,
    NOT_EQUALS,
    LESS_THAN,
    LESS_THAN_EQUALS,
    GREATER_THAN,
    GREATER_THAN_EQUALS,
    DOUBLE_EQUALS,
    ARROW,
    LEFT_SHIFT,
    LEFT_SHIFT_ASSIGN,
    AND,
    DOUBLE_AND,
    AND_ASSIGN,
    OR,
    DOUBLE_OR,
    OR_ASSIGN,
    PLUS,
    INCREMENT,
    PLUS_ASSIGN,
    MINUS,
    DECREMENT,
    MINUS_ASSIGN,
    STAR,
    STAR_ASSIGN,
    SLASH_ASSIGN,
    PERCENT,
    PERCENT_ASSIGN,
    XOR,
    XOR_ASSIGN,
    HASH,
}

impl SyntaxKind {
    pub fn is_whitespace(self) -> bool {
        self == Self::WHITESPACE
    }

    pub fn is_newline(self) -> bool {
        self == Self::NEW_LINE
    }

    pub fn is_comment_part(self) -> bool {
        matches!(
            self,
            Self::RAZOR_COMMENT_TRANSITION | Self::RAZOR_COMMENT_STAR | Self::RAZOR_COMMENT_LITERAL
        )
    }

    /// Closing partner of a bracket kind.
    pub fn closing(self) -> Option<Self> {
        Some(match self {
            Self::LEFT_PAREN => Self::RIGHT_PAREN,
            Self::LEFT_BRACKET => Self::RIGHT_BRACKET,
            Self::LEFT_BRACE => Self::RIGHT_BRACE,
            Self::LESS_THAN => Self::GREATER_THAN,
            _ => return None,
        })
    }
}
