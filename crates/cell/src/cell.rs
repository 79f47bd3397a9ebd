use core::{
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::{
    Bound, CellError, CellKind, CellProperty, LevelMask,
    bits::{BitPattern, BitStorage, BitWriterExt, Error as _},
    de::{CellDecode, CellParser},
    ser::CellBuilder,
};

/// Size of the representation hash in bytes
pub const HASH_BYTES: usize = 32;

/// Maximum depth of a cell at any level
pub const MAX_DEPTH: u16 = 1024;

/// A [Cell](https://docs.ton.org/develop/data-formats/cell-boc#cell).
///
/// Cells are immutable: hashes and depths for every level are calculated
/// once in [`Cell::new`]. Two cells are equal when their level-0 hashes
/// are equal.
#[derive(Clone)]
pub struct Cell {
    kind: CellKind,
    data: BitStorage,
    references: Vec<Arc<Self>>,
    level_mask: LevelMask,
    hashes: [[u8; HASH_BYTES]; 4],
    depths: [u16; 4],
}

impl Cell {
    /// Create new [`CellBuilder`] for an ordinary cell
    #[inline]
    #[must_use]
    pub const fn builder() -> CellBuilder {
        CellBuilder::new()
    }

    /// Create empty ordinary cell
    #[inline]
    pub fn empty() -> Result<Self, CellError> {
        Self::new(CellKind::Ordinary, BitStorage::new(), Vec::new())
    }

    /// Validates given content against bounds of `kind` and calculates
    /// hashes and depths for all levels.
    ///
    /// Data of exotic cells must start with their 8-bit kind tag.
    pub fn new(
        kind: CellKind,
        data: BitStorage,
        references: Vec<Arc<Self>>,
    ) -> Result<Self, CellError> {
        Self::check_bounds(kind, data.len(), references.len())?;
        if kind.is_exotic() {
            let tag = u8::from_pattern(data.view(0..8)?);
            let actual = CellKind::exotic_from_tag(tag)?;
            if actual != kind {
                return Err(CellError::KindMismatch {
                    expected: kind,
                    actual,
                });
            }
        }

        let level_mask = match kind {
            CellKind::Ordinary => Self::children_mask(&references),
            CellKind::PrunedBranch => Self::pruned_branch_mask(&data)?,
            CellKind::LibraryReference => LevelMask::default(),
            CellKind::MerkleProof | CellKind::MerkleUpdate => {
                Self::children_mask(&references) >> 1
            }
        };

        let mut cell = Self {
            kind,
            data,
            references,
            level_mask,
            hashes: [[0; HASH_BYTES]; 4],
            depths: [0; 4],
        };
        cell.calculate_hashes()?;
        Ok(cell)
    }

    /// Exotic cell referencing a library by its representation hash
    /// ```tlb
    /// library_ref#02 hash:bits256 = LibraryReference;
    /// ```
    pub fn library_reference(hash: [u8; HASH_BYTES]) -> Result<Self, CellError> {
        let mut data = BitStorage::new();
        data.pack(CellKind::LibraryReference.tag())?.with_bytes(hash)?;
        Self::new(CellKind::LibraryReference, data, Vec::new())
    }

    /// Replaces `cell` with a pruned branch keeping its hashes and depths,
    /// as done for subtrees omitted from a Merkle proof at `merkle_depth`.
    /// ```tlb
    /// pruned_branch#01 level_mask:uint8 hashes:(n * bits256) depths:(n * uint16) = PrunedBranch;
    /// ```
    pub fn pruned_branch(cell: &Self, merkle_depth: u8) -> Result<Self, CellError> {
        if merkle_depth >= LevelMask::MAX_LEVEL {
            return Err(CellError::InvalidDiscriminant {
                what: "merkle depth",
                value: merkle_depth.into(),
            });
        }
        let mask = cell.level_mask | LevelMask::new(1 << merkle_depth);
        let levels: Vec<u8> = (0..mask.level())
            .filter(|l| mask.is_significant(*l))
            .collect();

        let mut data = BitStorage::new();
        data.pack(CellKind::PrunedBranch.tag())?.pack(mask.as_u8())?;
        for &level in &levels {
            data.with_bytes(cell.hash_at(level))?;
        }
        for &level in &levels {
            data.pack(cell.depth_at(level))?;
        }
        Self::new(CellKind::PrunedBranch, data, Vec::new())
    }

    /// ```tlb
    /// !merkle_proof#03 {X:Type} virtual_hash:bits256 depth:uint16 virtual_root:^X = MERKLE_PROOF X;
    /// ```
    pub fn merkle_proof(root: Arc<Self>) -> Result<Self, CellError> {
        let mut data = BitStorage::new();
        data.pack(CellKind::MerkleProof.tag())?
            .with_bytes(root.hash_at(0))?
            .pack(root.depth_at(0))?;
        Self::new(CellKind::MerkleProof, data, vec![root])
    }

    /// ```tlb
    /// !merkle_update#04 {X:Type} from_hash:bits256 to_hash:bits256
    ///   from_depth:uint16 to_depth:uint16 from_proof:^X to_proof:^X
    ///   = MERKLE_UPDATE X;
    /// ```
    pub fn merkle_update(from: Arc<Self>, to: Arc<Self>) -> Result<Self, CellError> {
        let mut data = BitStorage::new();
        data.pack(CellKind::MerkleUpdate.tag())?
            .with_bytes(from.hash_at(0))?
            .with_bytes(to.hash_at(0))?
            .pack(from.depth_at(0))?
            .pack(to.depth_at(0))?;
        Self::new(CellKind::MerkleUpdate, data, vec![from, to])
    }

    fn check_bounds(kind: CellKind, bits: usize, references: usize) -> Result<(), CellError> {
        for (range, property, count) in [
            (kind.bits(), CellProperty::Bits, bits),
            (kind.references(), CellProperty::References, references),
        ] {
            if count < *range.start() {
                return Err(CellError::constraint(kind, Bound::Min, property, count));
            }
            if count > *range.end() {
                return Err(CellError::constraint(kind, Bound::Max, property, count));
            }
        }
        Ok(())
    }

    fn children_mask(references: &[Arc<Self>]) -> LevelMask {
        references
            .iter()
            .map(|r| r.level_mask)
            .fold(LevelMask::default(), |acc, m| acc | m)
    }

    fn pruned_branch_mask(data: &BitStorage) -> Result<LevelMask, CellError> {
        let kind = CellKind::PrunedBranch;
        if data.len() < 16 {
            return Err(CellError::constraint(
                kind,
                Bound::Min,
                CellProperty::Bits,
                data.len(),
            ));
        }
        let raw = data.to_bytes()[1];
        let mask = LevelMask::new(raw);
        if raw == 0 || mask.as_u8() != raw {
            return Err(CellError::InvalidDiscriminant {
                what: "pruned branch level mask",
                value: raw.into(),
            });
        }
        let expected = 16 + (mask.hash_count() - 1) * (HASH_BYTES * 8 + 16);
        if data.len() != expected {
            let bound = if data.len() < expected {
                Bound::Min
            } else {
                Bound::Max
            };
            return Err(CellError::constraint(
                kind,
                bound,
                CellProperty::Bits,
                data.len(),
            ));
        }
        Ok(mask)
    }

    /// [Standard Cell representation hash](https://docs.ton.org/develop/data-formats/cell-boc#standard-cell-representation-hash-calculation)
    /// for each significant level.
    ///
    /// Pruned branches only calculate their own representation hash, lower
    /// ones are stored in data.
    fn calculate_hashes(&mut self) -> Result<(), CellError> {
        let hash_count = self.level_mask.hash_count();
        let mut hashes: Vec<[u8; HASH_BYTES]> = Vec::with_capacity(hash_count);
        let mut depths: Vec<u16> = Vec::with_capacity(hash_count);

        if self.kind == CellKind::PrunedBranch {
            let stored = hash_count - 1;
            let bytes = self.data.to_bytes();
            let (hash_bytes, depth_bytes) = bytes[2..].split_at(stored * HASH_BYTES);
            hashes.extend(hash_bytes.chunks_exact(HASH_BYTES).map(|c| {
                let mut hash = [0; HASH_BYTES];
                hash.copy_from_slice(c);
                hash
            }));
            depths.extend(
                depth_bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]])),
            );
        }
        let offset = hashes.len();

        let bits_descriptor = self.bits_descriptor();
        let aligned = self.data.cell_aligned().to_bytes();
        let child_shift = self.kind.is_merkle() as u8;

        let mut hash_i = 0;
        for level in 0..=self.level_mask.level() {
            if !self.level_mask.is_significant(level) {
                continue;
            }
            if hash_i < offset {
                hash_i += 1;
                continue;
            }
            let child_level = level + child_shift;

            let mut d = Sha256::new();
            d.update([
                self.refs_descriptor_with(self.level_mask.apply(level)),
                bits_descriptor,
            ]);
            if hash_i == offset {
                d.update(&aligned);
            } else {
                d.update(hashes[hash_i - 1]);
            }
            // refs depth
            for r in &self.references {
                d.update(r.depth_at(child_level).to_be_bytes());
            }
            // refs hashes
            for r in &self.references {
                d.update(r.hash_at(child_level));
            }

            hashes.push(d.finalize().into());
            depths.push(
                self.references
                    .iter()
                    .map(|r| r.depth_at(child_level) + 1)
                    .max()
                    .unwrap_or(0),
            );
            hash_i += 1;
        }

        // children are bounded, so `+ 1` above cannot overflow
        if let Some(&depth) = depths.iter().find(|&&d| d > MAX_DEPTH) {
            return Err(CellError::DepthOverflow {
                depth,
                max: MAX_DEPTH,
            });
        }

        for level in 0..=LevelMask::MAX_LEVEL {
            let i = self.level_mask.hash_index(level);
            self.hashes[level as usize] = hashes[i];
            self.depths[level as usize] = depths[i];
        }
        Ok(())
    }

    #[inline]
    fn refs_descriptor_with(&self, mask: LevelMask) -> u8 {
        self.references.len() as u8 + 8 * self.kind.is_exotic() as u8 + 32 * mask.as_u8()
    }

    /// See [Cell serialization](https://docs.ton.org/develop/data-formats/cell-boc#cell-serialization)
    #[inline]
    pub fn refs_descriptor(&self) -> u8 {
        self.refs_descriptor_with(self.level_mask)
    }

    /// See [Cell serialization](https://docs.ton.org/develop/data-formats/cell-boc#cell-serialization)
    #[inline]
    pub fn bits_descriptor(&self) -> u8 {
        let b = self.data.len();
        (b / 8) as u8 + b.div_ceil(8) as u8
    }

    /// `[refs_descriptor, bits_descriptor]`
    #[inline]
    pub fn descriptors(&self) -> [u8; 2] {
        [self.refs_descriptor(), self.bits_descriptor()]
    }

    #[inline]
    pub const fn kind(&self) -> CellKind {
        self.kind
    }

    #[inline]
    pub const fn is_exotic(&self) -> bool {
        self.kind.is_exotic()
    }

    /// Data bits, including the kind tag for exotic cells
    #[inline]
    pub const fn bits(&self) -> &BitStorage {
        &self.data
    }

    #[inline]
    pub fn references(&self) -> &[Arc<Self>] {
        &self.references
    }

    #[inline]
    pub const fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    /// See [Cell level](https://docs.ton.org/develop/data-formats/cell-boc#cell-level)
    #[inline]
    pub const fn level(&self) -> u8 {
        self.level_mask.level()
    }

    /// Canonical level-0 hash
    #[inline]
    pub const fn hash(&self) -> [u8; HASH_BYTES] {
        self.hashes[0]
    }

    /// Hash at given level, levels above 3 are treated as 3
    #[inline]
    pub const fn hash_at(&self, level: u8) -> [u8; HASH_BYTES] {
        self.hashes[Self::level_index(level)]
    }

    /// Hash at the highest level, distinguishes pruned branches from the
    /// cells they replace
    #[inline]
    pub const fn representation_hash(&self) -> [u8; HASH_BYTES] {
        self.hashes[LevelMask::MAX_LEVEL as usize]
    }

    #[inline]
    pub const fn depth(&self) -> u16 {
        self.depths[0]
    }

    #[inline]
    pub const fn depth_at(&self, level: u8) -> u16 {
        self.depths[Self::level_index(level)]
    }

    #[inline]
    const fn level_index(level: u8) -> usize {
        if level > LevelMask::MAX_LEVEL {
            return LevelMask::MAX_LEVEL as usize;
        }
        level as usize
    }

    /// Returns whether this cell has no data and zero references.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.references.is_empty()
    }

    /// Return [`CellParser`] for this cell
    #[inline]
    #[must_use]
    pub fn parser(&self) -> CellParser<'_> {
        CellParser::new(self)
    }

    /// Shortcut for [`.parser()`](Cell::parser)[`.parse()`](CellParser::parse)[`.ensure_empty()`](CellParser::ensure_empty).
    #[inline]
    pub fn parse_fully<T>(&self) -> Result<T, CellError>
    where
        T: CellDecode,
    {
        let mut parser = self.parser();
        let v = parser.parse()?;
        parser.ensure_empty()?;
        Ok(v)
    }

    /// Checks that hash and depth stored in a Merkle proof match its
    /// virtual root.
    ///
    /// Merkle updates are not verified.
    pub fn verify_merkle_proof(&self) -> Result<(), CellError> {
        if self.kind != CellKind::MerkleProof {
            return Err(CellError::KindMismatch {
                expected: CellKind::MerkleProof,
                actual: self.kind,
            });
        }
        let bytes = self.data.to_bytes();
        let stored_hash = &bytes[1..1 + HASH_BYTES];
        let stored_depth = u16::from_be_bytes([bytes[1 + HASH_BYTES], bytes[2 + HASH_BYTES]]);
        let root = self.references.first().ok_or(CellError::Constraint {
            kind: self.kind,
            bound: Bound::Min,
            property: CellProperty::References,
            count: 0,
        })?;
        if stored_hash != root.hash_at(0) {
            return Err(CellError::custom(format!(
                "merkle proof hash mismatch: stored {}, virtual root {}",
                hex::encode(stored_hash),
                hex::encode(root.hash_at(0)),
            )));
        }
        if stored_depth != root.depth_at(0) {
            return Err(CellError::custom(format!(
                "merkle proof depth mismatch: stored {stored_depth}, virtual root {}",
                root.depth_at(0),
            )));
        }
        Ok(())
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{}[{}]", self.data.len(), self.data.to_hex_tagged())?;
        if self.references.is_empty() {
            return Ok(());
        }
        f.write_str(" -> {\n")?;
        for r in &self.references {
            write!(f, "{:width$}", "", width = (indent + 1) * 2)?;
            r.fmt_indented(f, indent + 1)?;
            f.write_str(",\n")?;
        }
        write!(f, "{:width$}}}", "", width = indent * 2)
    }
}

impl PartialEq for Cell {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hashes[0].hash(state);
    }
}

/// `<bits>[<hex>] -> { <children> }`, with `_` marking content not aligned
/// to 4 bits
impl Display for Cell {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("kind", &self.kind)
            .field("level", &self.level())
            .field("depth", &self.depth())
            .field("data", &self.data)
            .field("references", &self.references)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use crate::ser::CellEncodeExt;

    use super::*;

    fn ordinary(bits: &str, references: Vec<Arc<Cell>>) -> Arc<Cell> {
        Cell::new(CellKind::Ordinary, bits.parse().unwrap(), references)
            .unwrap()
            .into()
    }

    #[test]
    fn zero_depth() {
        assert_eq!(().to_cell().unwrap().depth(), 0)
    }

    #[test]
    fn max_depth() {
        let leaf = ordinary("", vec![]);
        let cell = ordinary(
            "",
            vec![
                leaf.clone(),
                ordinary("", vec![ordinary("", vec![ordinary("1", vec![leaf])])]),
            ],
        );
        assert_eq!(cell.depth(), 4)
    }

    #[test]
    fn hash_no_refs() {
        let cell = 0x0000000F_u32.to_cell().unwrap();

        assert_eq!(
            cell.hash(),
            hex!("57b520dbcb9d135863fc33963cde9f6db2ded1430d88056810a2c9434a3860f9")
        );
    }

    #[test]
    fn hash_with_refs() {
        let mut builder = Cell::builder();
        builder
            .store_pattern(0x00000B_u32, 24)
            .unwrap()
            .store_child(0x0000000F_u32)
            .unwrap()
            .store_child(0x0000000F_u32)
            .unwrap();
        let cell = builder.build().unwrap();

        assert_eq!(
            cell.hash(),
            hex!("f345277cc6cfa747f001367e1e873dcfa8a936b8492431248b7a3eeafa8030e7")
        );
    }

    #[test]
    fn equality_is_by_hash() {
        let a = ordinary("1101", vec![ordinary("1", vec![])]);
        let b = ordinary("1101", vec![ordinary("1", vec![])]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(a, ordinary("1101", vec![]));
    }

    #[test]
    fn descriptors() {
        let cell = ordinary("1101", vec![ordinary("", vec![])]);
        assert_eq!(cell.descriptors(), [1, 1]);
        assert_eq!(cell.bits().len(), 4);
        assert_eq!(ordinary(&"1".repeat(16), vec![]).bits_descriptor(), 4);
    }

    #[test]
    fn ordinary_bounds() {
        let too_long = BitStorage::repeating(false, 1024);
        assert_eq!(
            Cell::new(CellKind::Ordinary, too_long, vec![]).unwrap_err(),
            CellError::Constraint {
                kind: CellKind::Ordinary,
                bound: Bound::Max,
                property: CellProperty::Bits,
                count: 1024,
            }
        );
        assert!(Cell::new(CellKind::Ordinary, BitStorage::repeating(true, 1023), vec![]).is_ok());

        let leaf = ordinary("", vec![]);
        assert_eq!(
            Cell::new(CellKind::Ordinary, BitStorage::new(), vec![leaf; 5]).unwrap_err(),
            CellError::Constraint {
                kind: CellKind::Ordinary,
                bound: Bound::Max,
                property: CellProperty::References,
                count: 5,
            }
        );
    }

    #[test]
    fn exotic_bounds() {
        let mut short = BitStorage::new();
        short.push_pattern(CellKind::LibraryReference.tag(), 8);
        short.push_bits(&BitStorage::repeating(false, 255));
        assert!(matches!(
            Cell::new(CellKind::LibraryReference, short, vec![]),
            Err(CellError::Constraint {
                bound: Bound::Min,
                property: CellProperty::Bits,
                count: 263,
                ..
            })
        ));

        let mut proof = BitStorage::new();
        proof.push_pattern(CellKind::MerkleProof.tag(), 8);
        proof.push_bits(&BitStorage::repeating(false, 272));
        assert!(matches!(
            Cell::new(CellKind::MerkleProof, proof, vec![]),
            Err(CellError::Constraint {
                bound: Bound::Min,
                property: CellProperty::References,
                count: 0,
                ..
            })
        ));
    }

    #[test]
    fn exotic_tag_must_match_kind() {
        let mut data = BitStorage::new();
        data.push_pattern(CellKind::MerkleProof.tag(), 8);
        data.push_bits(&BitStorage::repeating(false, 256));
        assert_eq!(
            Cell::new(CellKind::LibraryReference, data, vec![]).unwrap_err(),
            CellError::KindMismatch {
                expected: CellKind::LibraryReference,
                actual: CellKind::MerkleProof,
            }
        );
    }

    #[test]
    fn library_reference() {
        let target = ordinary("1", vec![]);
        let library = Cell::library_reference(target.hash_at(0)).unwrap();
        assert!(library.is_exotic());
        assert_eq!(library.level(), 0);
        assert_eq!(library.bits().len(), CellKind::LIBRARY_REFERENCE_BITS);
        assert_eq!(library.refs_descriptor(), 8);
    }

    #[test]
    fn pruned_branch_keeps_lower_hashes() {
        let original = ordinary("1011", vec![ordinary("1", vec![])]);
        let pruned = Cell::pruned_branch(&original, 0).unwrap();

        assert_eq!(pruned.kind(), CellKind::PrunedBranch);
        assert_eq!(pruned.level_mask(), LevelMask::new(1));
        assert_eq!(pruned.level(), 1);
        assert_eq!(pruned.bits().len(), 16 + 256 + 16);
        assert_eq!(pruned.hash_at(0), original.hash_at(0));
        assert_eq!(pruned.depth_at(0), original.depth());
        assert_ne!(pruned.representation_hash(), original.hash_at(0));
        assert_eq!(pruned.depth_at(1), 0);
    }

    #[test]
    fn pruned_branch_size_must_match_mask() {
        let original = ordinary("1", vec![]);
        let pruned = Cell::pruned_branch(&original, 0).unwrap();
        let mut data = pruned.bits().clone();
        data.push_bit(false);
        assert!(matches!(
            Cell::new(CellKind::PrunedBranch, data, vec![]),
            Err(CellError::Constraint {
                bound: Bound::Max,
                ..
            })
        ));
    }

    #[test]
    fn merkle_proof_preserves_root_hash() {
        let secret = ordinary("111000", vec![]);
        let root = ordinary("01", vec![secret.clone(), ordinary("1", vec![])]);

        let pruned: Arc<Cell> = Cell::pruned_branch(&secret, 0).unwrap().into();
        let virtual_root = ordinary("01", vec![pruned, ordinary("1", vec![])]);
        assert_eq!(virtual_root.level(), 1);
        assert_eq!(virtual_root.hash_at(0), root.hash_at(0));
        assert_ne!(virtual_root.representation_hash(), root.hash_at(0));

        let proof = Cell::merkle_proof(virtual_root).unwrap();
        assert_eq!(proof.level(), 0);
        assert_eq!(proof.refs_descriptor(), 1 + 8);
        proof.verify_merkle_proof().unwrap();
    }

    #[test]
    fn merkle_proof_detects_forged_hash() {
        let root = ordinary("01", vec![]);
        let mut data = BitStorage::new();
        data.push_pattern(CellKind::MerkleProof.tag(), 8);
        data.push_bits(&BitStorage::repeating(true, 256));
        data.push_pattern(root.depth(), 16);
        let proof = Cell::new(CellKind::MerkleProof, data, vec![root]).unwrap();
        assert!(proof.verify_merkle_proof().is_err());
    }

    #[test]
    fn merkle_update_level() {
        let from = ordinary("0", vec![]);
        let to = ordinary("1", vec![]);
        let update = Cell::merkle_update(from, to).unwrap();
        assert_eq!(update.kind(), CellKind::MerkleUpdate);
        assert_eq!(update.level(), 0);
        assert_eq!(update.depth(), 1);
        assert!(update.verify_merkle_proof().is_err());
    }

    #[test]
    fn depth_is_bounded() {
        let mut cell = ordinary("", vec![]);
        for _ in 0..MAX_DEPTH {
            cell = ordinary("", vec![cell]);
        }
        assert_eq!(cell.depth(), MAX_DEPTH);
        assert_eq!(
            Cell::new(CellKind::Ordinary, BitStorage::new(), vec![cell]).unwrap_err(),
            CellError::DepthOverflow {
                depth: MAX_DEPTH + 1,
                max: MAX_DEPTH,
            }
        );
    }

    #[test]
    fn display() {
        let cell = ordinary("1101", vec![ordinary("1", vec![ordinary("", vec![])])]);
        assert_eq!(cell.to_string(), "4[D] -> {\n  1[C_] -> {\n    0[],\n  },\n}");
    }
}
