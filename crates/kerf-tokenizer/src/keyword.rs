use std::fmt;

macro_rules! keywords {
    ($($variant:ident => $text:literal,)*) => {
        /// Reserved words of the embedded code language.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
        pub enum Keyword {
            $($variant,)*
        }

        impl Keyword {
            pub const ALL: &'static [Keyword] = &[$(Keyword::$variant,)*];

            pub fn from_text(text: &str) -> Option<Self> {
                Some(match text {
                    $($text => Keyword::$variant,)*
                    _ => return None,
                })
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text,)*
                }
            }
        }
    };
}

keywords! {
    Abstract => "abstract",
    As => "as",
    Await => "await",
    Base => "base",
    Bool => "bool",
    Break => "break",
    Byte => "byte",
    Case => "case",
    Catch => "catch",
    Char => "char",
    Checked => "checked",
    Class => "class",
    Const => "const",
    Continue => "continue",
    Decimal => "decimal",
    Default => "default",
    Delegate => "delegate",
    Do => "do",
    Double => "double",
    Else => "else",
    Enum => "enum",
    Event => "event",
    Explicit => "explicit",
    Extern => "extern",
    False => "false",
    Finally => "finally",
    Fixed => "fixed",
    Float => "float",
    For => "for",
    Foreach => "foreach",
    Goto => "goto",
    If => "if",
    Implicit => "implicit",
    In => "in",
    Int => "int",
    Interface => "interface",
    Internal => "internal",
    Is => "is",
    Lock => "lock",
    Long => "long",
    Namespace => "namespace",
    New => "new",
    Null => "null",
    Object => "object",
    Operator => "operator",
    Out => "out",
    Override => "override",
    Params => "params",
    Private => "private",
    Protected => "protected",
    Public => "public",
    Readonly => "readonly",
    Ref => "ref",
    Return => "return",
    Sbyte => "sbyte",
    Sealed => "sealed",
    Short => "short",
    Sizeof => "sizeof",
    Stackalloc => "stackalloc",
    Static => "static",
    String => "string",
    Struct => "struct",
    Switch => "switch",
    This => "this",
    Throw => "throw",
    True => "true",
    Try => "try",
    Typeof => "typeof",
    Uint => "uint",
    Ulong => "ulong",
    Unchecked => "unchecked",
    Unsafe => "unsafe",
    Ushort => "ushort",
    Using => "using",
    Virtual => "virtual",
    Void => "void",
    Volatile => "volatile",
    While => "while",
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Keyword;

    #[test]
    fn table_round_trips() {
        for &keyword in Keyword::ALL {
            assert_eq!(Keyword::from_text(keyword.as_str()), Some(keyword));
        }
        assert_eq!(Keyword::from_text("When"), None);
        assert_eq!(Keyword::from_text("helper"), None);
    }
}
