use core::{
    fmt::{self, Binary},
    ops::{BitOr, Shr},
};

/// [Level mask](https://docs.ton.org/develop/data-formats/exotic-cells#level-mask):
/// bit `i` is set when hashes differ between levels `i` and `i + 1`
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const MAX_LEVEL: u8 = 3;

    #[inline]
    pub const fn new(mask: u8) -> Self {
        Self(mask & 0b111)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Index of the highest set bit plus one, `0` for empty mask
    #[inline]
    pub const fn level(self) -> u8 {
        (u8::BITS - self.0.leading_zeros()) as u8
    }

    /// Number of distinct hashes a cell with this mask has
    #[inline]
    pub const fn hash_count(self) -> usize {
        self.0.count_ones() as usize + 1
    }

    /// Position of hash for given `level` among [`hash_count`](Self::hash_count)
    #[inline]
    pub const fn hash_index(self, level: u8) -> usize {
        self.apply(level).0.count_ones() as usize
    }

    /// Keeps only bits below `level`
    #[inline]
    pub const fn apply(self, level: u8) -> Self {
        if level >= Self::MAX_LEVEL {
            return self;
        }
        Self(self.0 & ((1 << level) - 1))
    }

    /// Whether level `level` introduces a new hash
    #[inline]
    pub const fn is_significant(self, level: u8) -> bool {
        level == 0 || (self.0 >> (level - 1)) & 1 == 1
    }
}

impl BitOr for LevelMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl Shr<u8> for LevelMask {
    type Output = Self;

    #[inline]
    fn shr(self, rhs: u8) -> Self::Output {
        Self(self.0 >> rhs)
    }
}

impl Binary for LevelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Binary::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0b000, 0, 1)]
    #[case(0b001, 1, 2)]
    #[case(0b010, 2, 2)]
    #[case(0b101, 3, 3)]
    #[case(0b111, 3, 4)]
    fn level_and_hash_count(#[case] mask: u8, #[case] level: u8, #[case] hashes: usize) {
        let mask = LevelMask::new(mask);
        assert_eq!(mask.level(), level);
        assert_eq!(mask.hash_count(), hashes);
        assert_eq!(mask.hash_index(LevelMask::MAX_LEVEL), hashes - 1);
    }

    #[test]
    fn significant_levels() {
        let mask = LevelMask::new(0b101);
        assert_eq!(
            (0..=3).filter(|l| mask.is_significant(*l)).collect::<Vec<_>>(),
            [0, 1, 3]
        );
        assert_eq!(mask.hash_index(0), 0);
        assert_eq!(mask.hash_index(1), 1);
        assert_eq!(mask.hash_index(2), 1);
        assert_eq!(mask.hash_index(3), 2);
    }
}
