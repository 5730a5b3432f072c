use crate::SyntaxKind;

const SIZE: usize = 2;

/// A constant-time membership set over [`SyntaxKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyntaxSet {
    bits: [u64; SIZE],
}

impl SyntaxSet {
    pub const EMPTY: Self = Self { bits: [0; SIZE] };
    const BITS_PER_SLOT: u16 = u64::BITS as u16;

    const fn from_kind(kind: SyntaxKind) -> Self {
        let kind = kind as u16;
        let slot_index = (kind / Self::BITS_PER_SLOT) as usize;

        debug_assert!(
            slot_index < Self::EMPTY.bits.len(),
            "Index out of bounds. Increase the size of the bitset array."
        );

        let mut bits = Self::EMPTY.bits;
        bits[slot_index] = 1 << (kind % Self::BITS_PER_SLOT);
        Self { bits }
    }

    pub const fn union(mut self, other: &Self) -> Self {
        let mut i = 0;
        while i < self.bits.len() {
            self.bits[i] |= other.bits[i];
            i += 1;
        }
        self
    }

    pub const fn new<const N: usize>(kinds: [SyntaxKind; N]) -> Self {
        let mut set = Self::EMPTY;
        let mut i = 0;
        while i < kinds.len() {
            set = set.union(&Self::from_kind(kinds[i]));
            i += 1;
        }
        set
    }

    pub const fn with(self, kind: SyntaxKind) -> Self {
        self.union(&Self::from_kind(kind))
    }

    pub const fn contains(&self, kind: SyntaxKind) -> bool {
        let kind = kind as u16;
        let slot_index = (kind / Self::BITS_PER_SLOT) as usize;
        self.bits[slot_index] & (1 << (kind % Self::BITS_PER_SLOT)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::SyntaxSet;
    use crate::SyntaxKind::*;

    #[test]
    fn membership_across_slots() {
        const SET: SyntaxSet = SyntaxSet::new([WHITESPACE, HASH, XOR_ASSIGN]);
        assert!(SET.contains(WHITESPACE));
        assert!(SET.contains(HASH));
        assert!(SET.contains(XOR_ASSIGN));
        assert!(!SET.contains(TEXT));
        assert!(!SyntaxSet::EMPTY.contains(HASH));
        assert!(SyntaxSet::EMPTY.with(TEXT).contains(TEXT));
    }
}
