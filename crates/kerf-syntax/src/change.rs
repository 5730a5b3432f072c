use kerf_errors::SourceLocation;

/// A single edit to a document buffer.
///
/// Positions are absolute byte offsets. `old_text` is the text the edit removed
/// and `new_text` the text it inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextChange {
    pub old_position: usize,
    pub old_length: usize,
    pub new_position: usize,
    pub new_length: usize,
    pub old_text: String,
    pub new_text: String,
}

impl TextChange {
    /// Builds a change from the buffers before and after the edit.
    pub fn new(
        old_position: usize,
        old_length: usize,
        old_buffer: &str,
        new_position: usize,
        new_length: usize,
        new_buffer: &str,
    ) -> Self {
        let old_text = old_buffer
            .get(old_position..old_position.saturating_add(old_length))
            .unwrap_or_default()
            .to_owned();
        let new_text = new_buffer
            .get(new_position..new_position.saturating_add(new_length))
            .unwrap_or_default()
            .to_owned();
        Self { old_position, old_length, new_position, new_length, old_text, new_text }
    }

    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        let new_text = text.into();
        Self {
            old_position: position,
            old_length: 0,
            new_position: position,
            new_length: new_text.len(),
            old_text: String::new(),
            new_text,
        }
    }

    pub fn delete(position: usize, removed: impl Into<String>) -> Self {
        let old_text = removed.into();
        Self {
            old_position: position,
            old_length: old_text.len(),
            new_position: position,
            new_length: 0,
            old_text,
            new_text: String::new(),
        }
    }

    pub fn replace(position: usize, removed: impl Into<String>, text: impl Into<String>) -> Self {
        let old_text = removed.into();
        let new_text = text.into();
        Self {
            old_position: position,
            old_length: old_text.len(),
            new_position: position,
            new_length: new_text.len(),
            old_text,
            new_text,
        }
    }

    pub fn old_end(&self) -> usize {
        self.old_position.saturating_add(self.old_length)
    }

    pub fn is_insert(&self) -> bool {
        self.old_length == 0 && self.new_length > 0
    }

    pub fn is_delete(&self) -> bool {
        self.old_length > 0 && self.new_length == 0
    }

    pub fn is_replace(&self) -> bool {
        self.old_length > 0 && self.new_length > 0
    }

    /// Turns a replace that only appends to the replaced text into an insert.
    pub fn normalize(&self) -> Self {
        if self.is_replace()
            && self.new_length > self.old_length
            && self.new_position == self.old_position
            && self.new_text.starts_with(&self.old_text)
        {
            if let Some(appended) = self.new_text.get(self.old_text.len()..) {
                return Self::insert(self.old_end(), appended);
            }
        }
        self.clone()
    }

    /// Applies the change to `content`, a slice of the old buffer starting at `start`.
    pub fn apply(&self, content: &str, start: usize) -> Option<String> {
        let relative = self.old_position.checked_sub(start)?;
        let before = content.get(..relative)?;
        let after = content.get(relative.checked_add(self.old_length)?..)?;
        Some(format!("{before}{}{after}", self.new_text))
    }

    /// Applies the change to a whole buffer.
    pub fn apply_to_buffer(&self, buffer: &str) -> Option<String> {
        self.apply(buffer, 0)
    }

    /// The text of `content` the change removes, relative to `start`.
    pub fn original_text<'a>(&self, content: &'a str, start: usize) -> Option<&'a str> {
        let relative = self.old_position.checked_sub(start)?;
        content.get(relative..relative.checked_add(self.old_length)?)
    }
}

/// Maps locations after an edit from the old buffer to the new one.
///
/// Every location at or after `old_end` keeps its distance from the end of the
/// edit: same column offset on the edit's last line, same column elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationShift {
    pub old_end: SourceLocation,
    pub new_end: SourceLocation,
}

impl LocationShift {
    pub fn is_identity(&self) -> bool {
        self.old_end == self.new_end
    }

    pub fn apply(&self, location: SourceLocation) -> SourceLocation {
        if location.offset < self.old_end.offset {
            return location;
        }

        let offset = location.offset - self.old_end.offset + self.new_end.offset;
        if location.line == self.old_end.line {
            SourceLocation {
                offset,
                line: self.new_end.line,
                column: location.column - self.old_end.column + self.new_end.column,
            }
        } else {
            SourceLocation {
                offset,
                line: location.line - self.old_end.line + self.new_end.line,
                column: location.column,
            }
        }
    }

    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end.offset)) - i64::from(u32::from(self.old_end.offset))
    }
}

#[cfg(test)]
mod tests {
    use kerf_errors::SourceLocation;

    use super::{LocationShift, TextChange};

    #[test]
    fn change_kinds() {
        assert!(TextChange::insert(3, "x").is_insert());
        assert!(TextChange::delete(3, "x").is_delete());
        assert!(TextChange::replace(3, "x", "yy").is_replace());
    }

    #[test]
    fn change_from_buffers() {
        let change = TextChange::new(4, 0, "@foo", 4, 1, "@foo.");
        assert_eq!(change, TextChange::insert(4, "."));
    }

    #[test]
    fn normalize_turns_append_into_insert() {
        let change = TextChange::replace(1, "foo", "foo.bar");
        assert_eq!(change.normalize(), TextChange::insert(4, ".bar"));
        let change = TextChange::replace(1, "foo", "bar");
        assert_eq!(change.normalize(), change);
    }

    #[test]
    fn normalize_ignores_lengths_that_disagree_with_texts() {
        let change = TextChange::new(10, 2, "ab", 10, 5, "ab");
        assert!(change.old_text.is_empty());
        assert_eq!(change.normalize().new_text, "");
        assert_eq!(change.apply_to_buffer("ab"), None);
    }

    #[test]
    fn apply_relative_to_span() {
        let change = TextChange::replace(12, "b", "xyz");
        assert_eq!(change.apply("abc", 11).as_deref(), Some("axyzc"));
        assert_eq!(change.apply("abc", 13), None);
    }

    #[test]
    fn shift_same_and_later_lines() {
        let shift = LocationShift {
            old_end: SourceLocation::new(10, 1, 4),
            new_end: SourceLocation::new(13, 1, 7),
        };
        assert_eq!(shift.apply(SourceLocation::new(12, 1, 6)), SourceLocation::new(15, 1, 9));
        assert_eq!(shift.apply(SourceLocation::new(20, 2, 3)), SourceLocation::new(23, 2, 3));
        assert_eq!(shift.apply(SourceLocation::new(2, 0, 2)), SourceLocation::new(2, 0, 2));
        assert_eq!(shift.delta(), 3);
    }
}
