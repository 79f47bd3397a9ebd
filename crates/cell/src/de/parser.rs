use core::iter;
use std::sync::Arc;

use crate::{
    Cell, CellError, CellKind, ResultExt,
    bits::{
        BitPattern, BitReader, BitStorage, BitsError, ContinuousReader, Error,
        bitvec::{order::Msb0, slice::BitSlice},
    },
};

use super::CellDecode;

/// Cell parser created with [`Cell::parser()`].
///
/// Data and references are consumed independently, each from the front.
#[derive(Debug, Clone)]
pub struct CellParser<'a> {
    kind: CellKind,
    data: ContinuousReader<'a, BitSlice<u8, Msb0>>,
    references: ContinuousReader<'a, [Arc<Cell>]>,
}

impl<'a> CellParser<'a> {
    #[inline]
    pub(crate) fn new(cell: &'a Cell) -> Self {
        Self {
            kind: cell.kind(),
            data: ContinuousReader::new(cell.bits().as_bitslice()),
            references: ContinuousReader::new(cell.references()),
        }
    }

    /// Kind of the cell being parsed
    #[inline]
    pub const fn kind(&self) -> CellKind {
        self.kind
    }

    #[inline]
    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        Ok(self.data.read()?)
    }

    /// Borrows next `n` bits
    #[inline]
    pub fn load_bits(&mut self, n: usize) -> Result<&'a BitSlice<u8, Msb0>, CellError> {
        Ok(self.data.read_n(n)?)
    }

    #[inline]
    pub fn load_bytes(&mut self, n: usize) -> Result<Vec<u8>, CellError> {
        let bits = self.load_bits(n * 8)?;
        Ok(BitStorage::from(bits).to_bytes())
    }

    /// Loads next `width` bits as integer `T`, see [`BitPattern`]
    #[inline]
    pub fn load_pattern<T>(&mut self, width: usize) -> Result<T, CellError>
    where
        T: BitPattern,
    {
        self.load_bits(width).map(T::from_pattern)
    }

    /// Loads unsigned integer of `width` bits, failing when it does not
    /// fit into [`u128`]
    pub fn load_uint(&mut self, width: usize) -> Result<u128, CellError> {
        let bits = self.load_bits(width)?;
        let (high, low) = bits.split_at(width.saturating_sub(u128::BITS as usize));
        if high.any() {
            return Err(overflow(bits, width));
        }
        Ok(u128::from_pattern(low))
    }

    /// Loads two's complement integer of `width` bits, failing when it
    /// does not fit into [`i128`]
    pub fn load_int(&mut self, width: usize) -> Result<i128, CellError> {
        let bits = self.load_bits(width)?;
        let (high, low) = bits.split_at(width.saturating_sub(i128::BITS as usize));
        let sign = low.first().is_some_and(|bit| *bit);
        if high.iter().by_vals().any(|bit| bit != sign) {
            return Err(overflow(bits, width));
        }
        Ok(i128::from_pattern(low))
    }

    /// Parse the value using its [`CellDecode`] implementation
    #[inline]
    pub fn parse<T>(&mut self) -> Result<T, CellError>
    where
        T: CellDecode,
    {
        T::decode(self)
    }

    /// Return iterator that parses values using [`CellDecode`]
    /// implementation.
    #[inline]
    pub fn parse_iter<T>(&mut self) -> impl Iterator<Item = Result<T, CellError>> + '_
    where
        T: CellDecode,
    {
        iter::repeat_with(move || self.parse())
            .enumerate()
            .map(|(i, v)| v.with_context(|| format!("[{i}]")))
    }

    /// [Maybe](https://docs.ton.org/develop/data-formats/tl-b-types#maybe)
    /// with a single presence bit
    #[inline]
    pub fn parse_maybe<T>(&mut self) -> Result<Option<T>, CellError>
    where
        T: CellDecode,
    {
        Ok(match self.load_bit()? {
            false => None,
            true => Some(self.parse().context("just")?),
        })
    }

    /// Returns [`None`] and consumes `absent` when the data continues with
    /// it, parses the value otherwise.
    pub fn parse_maybe_with_pattern<T>(
        &mut self,
        absent: &BitSlice<u8, Msb0>,
    ) -> Result<Option<T>, CellError>
    where
        T: CellDecode,
    {
        if self.data.remaining() >= absent.len() {
            if self.data.read_n(absent.len())? == absent {
                return Ok(None);
            }
            self.data.rewind(absent.len())?;
        }
        self.parse().map(Some)
    }

    /// Takes next reference
    #[inline]
    pub fn load_reference(&mut self) -> Result<&'a Arc<Cell>, CellError> {
        self.references
            .read()
            .map_err(CellError::from)
            .context("reference")
    }

    /// Parses next reference as an ordinary cell, which must be consumed
    /// fully
    #[inline]
    pub fn parse_child<T>(&mut self) -> Result<T, CellError>
    where
        T: CellDecode,
    {
        self.parse_child_of(CellKind::Ordinary)
    }

    /// Parses next reference, which must be a cell of `expected` kind and
    /// must be consumed fully
    pub fn parse_child_of<T>(&mut self, expected: CellKind) -> Result<T, CellError>
    where
        T: CellDecode,
    {
        let child = self.load_reference()?;
        if child.kind() != expected {
            return Err(CellError::KindMismatch {
                expected,
                actual: child.kind(),
            });
        }
        child.parse_fully()
    }

    /// `Either X ^X`: the value is either inline or in the next reference
    /// ```tlb
    /// left$0 {X:Type} {Y:Type} value:X = Either X Y;
    /// right$1 {X:Type} {Y:Type} value:Y = Either X Y;
    /// ```
    #[inline]
    pub fn parse_either<T>(&mut self) -> Result<T, CellError>
    where
        T: CellDecode,
    {
        match self.load_bit()? {
            false => self.parse().context("left"),
            true => self.parse_child().context("right"),
        }
    }

    /// Consumes all remaining data and references into a new ordinary
    /// cell
    pub fn load_remainder(&mut self) -> Result<Cell, CellError> {
        let data = self.data.fast_forward().into();
        let references = self.references.fast_forward().to_vec();
        Cell::new(CellKind::Ordinary, data, references)
    }

    #[inline]
    pub fn bits_left(&self) -> usize {
        self.data.remaining()
    }

    #[inline]
    pub fn references_left(&self) -> usize {
        self.references.remaining()
    }

    /// Returns whether this parser has no more data and references.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0 && self.references_left() == 0
    }

    /// Returns an error if this parser has more data or references.
    #[inline]
    pub fn ensure_empty(&self) -> Result<(), CellError> {
        if !self.is_empty() {
            return Err(CellError::custom(format!(
                "more data left: {} bits, {} references",
                self.bits_left(),
                self.references_left(),
            )));
        }
        Ok(())
    }
}

fn overflow(bits: &BitSlice<u8, Msb0>, width: usize) -> CellError {
    BitsError::Overflow {
        value: BitStorage::from(bits).to_hex_tagged(),
        bits: width,
    }
    .into()
}

impl BitReader for CellParser<'_> {
    type Error = CellError;

    #[inline]
    fn bits_left(&self) -> usize {
        self.data.remaining()
    }

    #[inline]
    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        self.load_bit()
    }

    #[inline]
    fn read_bits_into(&mut self, dst: &mut BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        dst.copy_from_bitslice(self.load_bits(dst.len())?);
        Ok(())
    }

    #[inline]
    fn skip(&mut self, n: usize) -> Result<(), Self::Error> {
        self.load_bits(n)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bits::{BitReaderExt, BitStorage},
        ser::{CellEncodeExt, Footprint},
    };

    use super::*;

    fn ordinary(bits: &str, references: Vec<Arc<Cell>>) -> Cell {
        Cell::new(CellKind::Ordinary, bits.parse().unwrap(), references).unwrap()
    }

    #[test]
    fn loads_in_order() {
        let cell = ordinary("1101", Vec::new());
        let mut parser = cell.parser();
        assert!(parser.load_bit().unwrap());
        assert_eq!(parser.load_pattern::<u8>(3).unwrap(), 0b101);
        assert!(parser.is_empty());
        assert!(matches!(
            parser.load_bit().unwrap_err(),
            CellError::Bits(BitsError::Boundary {
                requested: 1,
                available: 0,
            })
        ));
    }

    #[test]
    fn checked_integers() {
        let cell = ordinary("11111111", Vec::new());
        assert_eq!(cell.parser().load_uint(8).unwrap(), 255);
        assert_eq!(cell.parser().load_int(8).unwrap(), -1);
        assert_eq!(cell.parser().load_int(4).unwrap(), -1);

        let mut wide = Cell::builder();
        wide.store_uint(1, 130).unwrap();
        let wide = wide.build().unwrap();
        assert_eq!(wide.parser().load_uint(130).unwrap(), 1);

        let mut overflow = Cell::builder();
        overflow.store_bit(true).unwrap().store_uint(0, 129).unwrap();
        let overflow = overflow.build().unwrap();
        assert!(matches!(
            overflow.parser().load_uint(130).unwrap_err(),
            CellError::Bits(BitsError::Overflow { bits: 130, .. })
        ));
    }

    #[test]
    fn references_are_independent_of_data() {
        let leaf = Arc::new(ordinary("1", Vec::new()));
        let cell = ordinary("0", vec![leaf.clone()]);
        let mut parser = cell.parser();
        assert_eq!(parser.load_reference().unwrap(), &leaf);
        assert!(!parser.load_bit().unwrap());
        let err = parser.load_reference().unwrap_err();
        assert!(err.to_string().starts_with("reference: "), "{err}");
    }

    #[test]
    fn ensure_empty_reports_leftovers() {
        let cell = ordinary("101", vec![Arc::new(Cell::empty().unwrap())]);
        let mut parser = cell.parser();
        parser.skip(1).unwrap();
        assert_eq!(
            parser.ensure_empty().unwrap_err().to_string(),
            "more data left: 2 bits, 1 references"
        );
    }

    #[test]
    fn child_kind_is_checked() {
        let proof = Arc::new(Cell::merkle_proof(Arc::new(Cell::empty().unwrap())).unwrap());
        let cell = ordinary("", vec![proof]);
        assert_eq!(
            cell.parser().parse_child::<Cell>().unwrap_err(),
            CellError::KindMismatch {
                expected: CellKind::Ordinary,
                actual: CellKind::MerkleProof,
            }
        );
        let mut parser = cell.parser();
        let proof = parser
            .parse_child_of::<BitStorage>(CellKind::MerkleProof)
            .unwrap_err();
        assert!(matches!(proof, CellError::Custom(_)), "{proof}");
    }

    #[test]
    fn maybe_with_pattern_rewinds() {
        let absent: BitStorage = "00".parse().unwrap();
        let mut builder = Cell::builder();
        builder
            .store_maybe_with_pattern(None::<u8>, &absent)
            .unwrap()
            .store_maybe_with_pattern(Some(0x80u8), &absent)
            .unwrap();
        let cell = builder.build().unwrap();
        let mut parser = cell.parser();
        assert_eq!(parser.parse_maybe_with_pattern::<u8>(&absent).unwrap(), None);
        assert_eq!(
            parser.parse_maybe_with_pattern::<u8>(&absent).unwrap(),
            Some(0x80)
        );
        assert!(parser.is_empty());
    }

    #[test]
    fn either_round_trip() {
        let mut builder = Cell::builder();
        builder
            .store_either(0xABu8, Footprint::default())
            .unwrap()
            .store_bits(&BitStorage::repeating(true, 1010))
            .unwrap()
            .store_either(0xCDu8, Footprint::default())
            .unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.references().len(), 1);

        let mut parser = cell.parser();
        assert_eq!(parser.parse_either::<u8>().unwrap(), 0xAB);
        parser.skip(1010).unwrap();
        assert_eq!(parser.parse_either::<u8>().unwrap(), 0xCD);
        parser.ensure_empty().unwrap();
    }

    #[test]
    fn reads_through_bit_reader() {
        let cell = (0xABCDu16, true).to_cell().unwrap();
        let mut parser = cell.parser();
        assert_eq!(parser.read_bytes_array::<2>().unwrap(), [0xAB, 0xCD]);
        assert!(parser.unpack::<bool>().unwrap());
    }
}
