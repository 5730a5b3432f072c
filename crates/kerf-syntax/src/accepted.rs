bitflags::bitflags! {
    /// Which characters an edit may introduce into a span without a reparse.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AcceptedCharacters: u8 {
        const NEW_LINE = 1;
        const WHITE_SPACE = 1 << 1;
        const NON_WHITE_SPACE = 1 << 2;
        const ALL_WHITE_SPACE = Self::NEW_LINE.bits() | Self::WHITE_SPACE.bits();
        const ANY_EXCEPT_NEWLINE = Self::NON_WHITE_SPACE.bits() | Self::WHITE_SPACE.bits();
        const ANY = Self::ALL_WHITE_SPACE.bits() | Self::NON_WHITE_SPACE.bits();
    }
}

impl AcceptedCharacters {
    pub const NONE: Self = Self::empty();

    /// True when every character of `text` falls into an accepted class.
    pub fn admits(self, text: &str) -> bool {
        text.chars().all(|c| {
            let class = if kerf_tokenizer::is_newline(c) {
                Self::NEW_LINE
            } else if c.is_whitespace() {
                Self::WHITE_SPACE
            } else {
                Self::NON_WHITE_SPACE
            };
            self.contains(class)
        })
    }

    pub fn name(self) -> &'static str {
        const NAMES: [(AcceptedCharacters, &str); 7] = [
            (AcceptedCharacters::NONE, "None"),
            (AcceptedCharacters::NEW_LINE, "NewLine"),
            (AcceptedCharacters::WHITE_SPACE, "WhiteSpace"),
            (AcceptedCharacters::NON_WHITE_SPACE, "NonWhiteSpace"),
            (AcceptedCharacters::ALL_WHITE_SPACE, "AllWhiteSpace"),
            (AcceptedCharacters::ANY_EXCEPT_NEWLINE, "AnyExceptNewline"),
            (AcceptedCharacters::ANY, "Any"),
        ];
        NAMES.iter().find(|(flags, _)| *flags == self).map_or("Mixed", |(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::AcceptedCharacters;

    #[test]
    fn admits_by_class() {
        assert!(AcceptedCharacters::ANY.admits("a b\n"));
        assert!(AcceptedCharacters::ANY_EXCEPT_NEWLINE.admits("a b"));
        assert!(!AcceptedCharacters::ANY_EXCEPT_NEWLINE.admits("a\n"));
        assert!(AcceptedCharacters::WHITE_SPACE.admits("  \t"));
        assert!(!AcceptedCharacters::NON_WHITE_SPACE.admits("a b"));
        assert!(!AcceptedCharacters::NONE.admits("x"));
        assert!(AcceptedCharacters::NONE.admits(""));
    }
}
