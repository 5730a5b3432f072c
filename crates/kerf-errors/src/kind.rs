/// Every problem the tokenizers, parsers and the tag rewriter can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    // Lexical.
    #[error(
        "end of file was reached before the end of the template comment; comments started with `@*` must be terminated with `*@`"
    )]
    UnterminatedComment,
    #[error(
        "end of file was reached before the end of the block comment; comments started with `/*` must be terminated with `*/`"
    )]
    UnterminatedBlockComment,
    #[error(
        "unterminated string literal; strings that start with a quotation mark must be terminated before the end of the line"
    )]
    UnterminatedString,
    #[error("unterminated character literal")]
    UnterminatedChar,

    // Markup.
    #[error(
        "element `{0}` was not closed; all elements must be either self-closing or have a matching end tag"
    )]
    MissingEndTag(String),
    #[error(
        "encountered end tag `{0}` with no matching start tag; are your start/end tags properly balanced?"
    )]
    UnexpectedEndTag(String),
    #[error(
        "end of file or an unexpected character was reached before the `{0}` tag could be parsed; elements inside markup blocks must be complete"
    )]
    UnfinishedTag(String),
    #[error(
        "outer tag is missing a name; the first character of a markup block must be an HTML tag with a valid name"
    )]
    OuterTagMissingName,
    #[error("`text` tags cannot contain attributes")]
    TextTagCannotContainAttributes,
    #[error(
        "markup in a code block must start with a tag and all start tags must be matched with end tags; use `@:` for single lines of text"
    )]
    MarkupBlockMustStartWithTag,

    // Code.
    #[error(
        "the {block} block is missing a closing `{close}` character; make sure you have a matching `{close}` for all the `{open}` characters within this block"
    )]
    ExpectedEndOfBlockBeforeEof { block: String, close: char, open: char },
    #[error("an opening `{open}` is missing the corresponding closing `{close}`")]
    ExpectedCloseBracketBeforeEof { open: char, close: char },
    #[error(
        "unexpected `{{` after `@`; once inside a code block you do not need `@{{` to switch to code"
    )]
    UnexpectedNestedCodeBlock,
    #[error(
        "the `@` character must be followed by a `:`, `(`, or a code identifier; use `@@` for a literal `@`"
    )]
    AtInCodeMustBeFollowedByColonParenOrIdentifierStart,
    #[error(
        "a space or line break was encountered after the `@` character; only identifiers, keywords, comments, `(` and `{{` are valid at the start of a code block"
    )]
    UnexpectedWhiteSpaceAtStartOfCodeBlock,
    #[error(
        "end of file was reached after the `@` character; `@` must be followed by an identifier, keyword, comment, `(` or `{{`"
    )]
    UnexpectedEofAtStartOfCodeBlock,
    #[error(
        "`{0}` is not valid at the start of a code block; only identifiers, keywords, comments, `(` and `{{` are valid"
    )]
    UnexpectedCharacterAtStartOfCodeBlock(String),
    #[error(
        "inline markup blocks (`@<p>content</p>`) cannot be nested; only one level of inline markup is allowed"
    )]
    InlineMarkupBlocksCannotBeNested,
    #[error("expected a `{{` but found `{0}`; block statements must be enclosed in `{{` and `}}`")]
    SingleLineControlFlowStatementsNotAllowed(String),
    #[error("`{0}` is a reserved word")]
    ReservedWord(String),
    #[error("namespace imports and type aliases cannot be placed within code blocks")]
    NamespaceImportAndTypeAliasCannotExistWithinCodeBlock,
    #[error("the `helper` directive is not supported")]
    HelperDirectiveNotAvailable,
    #[error(
        "section blocks (`@section Header {{ ... }}`) cannot be nested; only one level of section blocks is allowed"
    )]
    SectionsCannotBeNested,

    // Directives.
    #[error("the `{0}` directive may only occur once per document")]
    DuplicateDirective(String),
    #[error("the `{0}` directive must appear at the start of the line")]
    DirectiveMustAppearAtStartOfLine(String),
    #[error("the `{0}` directive expects a type name")]
    DirectiveExpectsTypeName(String),
    #[error("the `{0}` directive expects a namespace name")]
    DirectiveExpectsNamespace(String),
    #[error("the `{0}` directive expects an identifier")]
    DirectiveExpectsIdentifier(String),
    #[error("the `{0}` directive expects a string surrounded by double quotes")]
    DirectiveExpectsQuotedStringLiteral(String),
    #[error("unexpected end of file following the `{directive}` directive; expected `{expected}`")]
    UnexpectedEofAfterDirective { directive: String, expected: String },
    #[error("unexpected literal following the `{directive}` directive; expected `{expected}`")]
    UnexpectedDirectiveLiteral { directive: String, expected: String },
    #[error("the `{0}` directive must have its tokens separated by whitespace")]
    DirectiveTokensMustBeSeparatedByWhitespace(String),
    #[error("directive `{0}` must have a value")]
    DirectiveMustHaveValue(String),
    #[error(
        "optional quote around the `{0}` directive is missing the corresponding opening or closing quote"
    )]
    IncompleteQuotesAroundDirective(String),

    // Tag helpers.
    #[error(
        "found a malformed `{0}` tag helper; tag helpers must have a start and end tag or be self closing"
    )]
    MalformedTagHelper(String),
    #[error("missing close angle for tag helper `{0}`")]
    TagHelperMissingCloseAngle(String),
    #[error(
        "found an end tag (`</{tag}>`) for tag helper `{helper}` with tag structure that disallows an end tag"
    )]
    TagHelperMustNotHaveAnEndTag { tag: String, helper: String },
    #[error(
        "tag helpers `{first}` and `{second}` targeting element `{tag}` must not expect different tag structures"
    )]
    InconsistentTagStructure { first: String, second: String, tag: String },
    #[error(
        "the `<{tag}>` tag is not allowed by parent `<{parent}>` tag helper; only child tags with name(s) `{allowed}` are allowed"
    )]
    InvalidNestedTag { tag: String, parent: String, allowed: String },
    #[error(
        "the parent `<{parent}>` tag helper does not allow non-tag content; only child tag helper(s) targeting tag name(s) `{allowed}` are allowed"
    )]
    CannotHaveNonTagContent { parent: String, allowed: String },
    #[error(
        "attribute `{attribute}` on tag helper element `{tag}` requires a value; tag helper bound attributes of type `{type_name}` cannot be empty or contain only whitespace"
    )]
    EmptyBoundAttribute { attribute: String, tag: String, type_name: String },
    #[error("the tag helper `{0}` must not have code in the element's attribute declaration area")]
    TagHelpersCannotHaveCodeInTagDeclaration(String),
    #[error("tag helper attributes must be well-formed")]
    TagHelperAttributeListMustBeWellFormed,
    #[error(
        "the tag helper attribute `{attribute}` in element `{tag}` is missing a key; the syntax is `<{tag} {attribute}{{ key }}=\"value\">`"
    )]
    IndexerAttributeNameMustIncludeKey { attribute: String, tag: String },
}
