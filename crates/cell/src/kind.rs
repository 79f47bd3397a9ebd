use core::ops::RangeInclusive;

use strum::{Display, FromRepr};

use crate::CellError;

/// [Cell type](https://docs.ton.org/develop/data-formats/exotic-cells).
///
/// Exotic kinds carry their discriminant in the first 8 bits of data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, FromRepr)]
#[repr(u8)]
pub enum CellKind {
    #[default]
    Ordinary = 0,
    PrunedBranch = 1,
    LibraryReference = 2,
    MerkleProof = 3,
    MerkleUpdate = 4,
}

impl CellKind {
    /// Maximum bits an ordinary cell can hold
    pub const MAX_BITS: usize = 1023;
    /// Maximum references any cell can hold
    pub const MAX_REFERENCES: usize = 4;

    /// `tag(8) + mask(8) + 3 * (hash(256) + depth(16))`
    pub const PRUNED_BRANCH_MAX_BITS: usize = 8 + 8 + 3 * (256 + 16);
    /// `tag(8) + hash(256)`
    pub const LIBRARY_REFERENCE_BITS: usize = 8 + 256;
    /// `tag(8) + hash(256) + depth(16)`
    pub const MERKLE_PROOF_MIN_BITS: usize = 8 + 256 + 16;
    /// `tag(8) + 2 * (hash(256) + depth(16))`
    pub const MERKLE_UPDATE_MIN_BITS: usize = 8 + 2 * (256 + 16);

    /// Resolves exotic kind from its data tag
    #[inline]
    pub fn exotic_from_tag(tag: u8) -> Result<Self, CellError> {
        match Self::from_repr(tag) {
            Some(kind) if kind.is_exotic() => Ok(kind),
            _ => Err(CellError::UnknownExoticKind(tag)),
        }
    }

    #[inline]
    pub const fn is_exotic(self) -> bool {
        !matches!(self, Self::Ordinary)
    }

    #[inline]
    pub const fn is_merkle(self) -> bool {
        matches!(self, Self::MerkleProof | Self::MerkleUpdate)
    }

    /// Discriminant stored in the first 8 bits of exotic cells
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Allowed number of data bits
    pub const fn bits(self) -> RangeInclusive<usize> {
        match self {
            Self::Ordinary => 0..=Self::MAX_BITS,
            Self::PrunedBranch => 8..=Self::PRUNED_BRANCH_MAX_BITS,
            Self::LibraryReference => Self::LIBRARY_REFERENCE_BITS..=Self::LIBRARY_REFERENCE_BITS,
            Self::MerkleProof => Self::MERKLE_PROOF_MIN_BITS..=Self::MAX_BITS,
            Self::MerkleUpdate => Self::MERKLE_UPDATE_MIN_BITS..=Self::MAX_BITS,
        }
    }

    /// Allowed number of references
    pub const fn references(self) -> RangeInclusive<usize> {
        match self {
            Self::Ordinary => 0..=Self::MAX_REFERENCES,
            Self::PrunedBranch | Self::LibraryReference => 0..=0,
            Self::MerkleProof => 1..=1,
            Self::MerkleUpdate => 2..=2,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CellKind::Ordinary, 0, 1023, 0, 4)]
    #[case(CellKind::PrunedBranch, 8, 832, 0, 0)]
    #[case(CellKind::LibraryReference, 264, 264, 0, 0)]
    #[case(CellKind::MerkleProof, 280, 1023, 1, 1)]
    #[case(CellKind::MerkleUpdate, 552, 1023, 2, 2)]
    fn bounds(
        #[case] kind: CellKind,
        #[case] min_bits: usize,
        #[case] max_bits: usize,
        #[case] min_refs: usize,
        #[case] max_refs: usize,
    ) {
        assert_eq!(kind.bits(), min_bits..=max_bits);
        assert_eq!(kind.references(), min_refs..=max_refs);
    }

    #[test]
    fn exotic_tags() {
        assert_eq!(CellKind::exotic_from_tag(3), Ok(CellKind::MerkleProof));
        assert_eq!(
            CellKind::exotic_from_tag(0),
            Err(CellError::UnknownExoticKind(0))
        );
        assert_eq!(
            CellKind::exotic_from_tag(5),
            Err(CellError::UnknownExoticKind(5))
        );
    }
}
