use core::{
    fmt::{self, Display},
    ops::Range,
    str::FromStr,
};

use bitvec::{order::Msb0, slice::BitSlice, vec::BitVec};
use impl_tools::autoimpl;

use crate::{BitPattern, BitReader, BitUnpack, BitWriter, BitsError};

/// Growable MSB-first sequence of bits.
///
/// Equality, hashing and ordering are defined by the full bit content.
#[autoimpl(Deref using self.bits)]
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitStorage {
    bits: BitVec<u8, Msb0>,
}

impl BitStorage {
    #[inline]
    pub const fn new() -> Self {
        Self {
            bits: BitVec::EMPTY,
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(capacity),
        }
    }

    /// `n` copies of `bit`
    #[inline]
    pub fn repeating(bit: bool, n: usize) -> Self {
        Self {
            bits: BitVec::repeat(bit, n),
        }
    }

    #[inline]
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            bits: BitVec::from_slice(bytes.as_ref()),
        }
    }

    #[inline]
    pub fn as_bitslice(&self) -> &BitSlice<u8, Msb0> {
        &self.bits
    }

    #[inline]
    pub fn into_bitvec(self) -> BitVec<u8, Msb0> {
        self.bits
    }

    #[inline]
    pub fn push_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    #[inline]
    pub fn push_bits(&mut self, bits: &BitSlice<u8, Msb0>) {
        self.bits.extend_from_bitslice(bits);
    }

    #[inline]
    pub fn push_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        self.push_bits(BitSlice::from_slice(bytes.as_ref()));
    }

    /// Appends lowest `width` bits of `value`, see [`BitPattern`]
    #[inline]
    pub fn push_pattern<T>(&mut self, value: T, width: usize)
    where
        T: BitPattern,
    {
        self.bits.reserve(width);
        self.bits.extend(value.pattern_bits(width));
    }

    /// Re-interprets whole content as integer `T`
    #[inline]
    pub fn pattern<T>(&self) -> T
    where
        T: BitPattern,
    {
        T::from_pattern(&self.bits)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Result<bool, BitsError> {
        self.bits
            .get(index)
            .map(|bit| *bit)
            .ok_or(BitsError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    #[inline]
    pub fn set(&mut self, index: usize, bit: bool) -> Result<(), BitsError> {
        let len = self.len();
        let mut slot = self
            .bits
            .get_mut(index)
            .ok_or(BitsError::OutOfRange { index, len })?;
        *slot = bit;
        Ok(())
    }

    /// Borrows given sub-range without copying
    #[inline]
    pub fn view(&self, range: Range<usize>) -> Result<&BitSlice<u8, Msb0>, BitsError> {
        let len = self.len();
        if range.start > range.end {
            return Err(BitsError::OutOfRange {
                index: range.start,
                len,
            });
        }
        self.bits.get(range.clone()).ok_or(BitsError::OutOfRange {
            index: range.end,
            len,
        })
    }

    /// Pads with a single `1` followed by zeros up to the next byte boundary.
    /// Byte-aligned content is returned as is.
    #[inline]
    pub fn cell_aligned(&self) -> Self {
        self.aligned_to(8)
    }

    /// Strips a trailing completion tag written by
    /// [`cell_aligned`](Self::cell_aligned).
    ///
    /// Byte-aligned content carries no tag, so the caller decides whether
    /// one is there: `"10110000"` unaligns to `"101"`.
    #[inline]
    pub fn cell_unaligned(&self) -> Result<Self, BitsError> {
        self.unaligned_from(8)
    }

    /// Same as [`cell_aligned`](Self::cell_aligned) but pads to 4 bits
    #[inline]
    pub fn nibble_aligned(&self) -> Self {
        self.aligned_to(4)
    }

    #[inline]
    pub fn nibble_unaligned(&self) -> Result<Self, BitsError> {
        self.unaligned_from(4)
    }

    fn aligned_to(&self, block: usize) -> Self {
        let rest = self.len() % block;
        let mut aligned = self.clone();
        if rest != 0 {
            aligned.bits.push(true);
            aligned.bits.resize(self.len() + block - rest, false);
        }
        aligned
    }

    fn unaligned_from(&self, block: usize) -> Result<Self, BitsError> {
        let Some(tag) = self.bits.last_one() else {
            return Err(BitsError::missing_tag(block));
        };
        if self.len() - tag > block {
            return Err(BitsError::missing_tag(block));
        }
        let mut unaligned = self.clone();
        unaligned.bits.truncate(tag);
        Ok(unaligned)
    }

    /// Content as bytes, last one padded with zeros
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bits = self.bits.clone();
        bits.force_align();
        bits.resize(self.len().next_multiple_of(8), false);
        bits.into_vec()
    }

    /// Content as 4-bit chunks, last one padded with zeros
    pub fn nibbles(&self) -> Vec<u8> {
        self.to_bytes()
            .into_iter()
            .flat_map(|b| [b >> 4, b & 0xf])
            .take(self.len().div_ceil(4))
            .collect()
    }

    /// Hex form with `_` completion tag for content not aligned to 4 bits,
    /// e.g. `"C_"` for `"1"`
    pub fn to_hex_tagged(&self) -> String {
        let tagged = self.len() % 4 != 0;
        let mut s: String = self
            .nibble_aligned()
            .nibbles()
            .into_iter()
            .map(|n| char::from_digit(n as u32, 16).map_or('?', |c| c.to_ascii_uppercase()))
            .collect();
        if tagged {
            s.push('_');
        }
        s
    }

    pub fn from_hex_tagged(s: &str) -> Result<Self, BitsError> {
        let (digits, tagged) = match s.strip_suffix('_') {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        let mut bits = Self::with_capacity(digits.len() * 4);
        for c in digits.chars() {
            let nibble = c.to_digit(16).ok_or(BitsError::InvalidCharacter(c))?;
            bits.push_pattern(nibble, 4);
        }
        if tagged {
            return bits.nibble_unaligned();
        }
        Ok(bits)
    }
}

impl BitsError {
    fn missing_tag(block: usize) -> Self {
        Self::Custom(format!("no completion tag within last {block} bits"))
    }
}

impl From<BitVec<u8, Msb0>> for BitStorage {
    #[inline]
    fn from(mut bits: BitVec<u8, Msb0>) -> Self {
        bits.force_align();
        Self { bits }
    }
}

impl From<&BitSlice<u8, Msb0>> for BitStorage {
    #[inline]
    fn from(bits: &BitSlice<u8, Msb0>) -> Self {
        // `to_bitvec` keeps the head offset of the slice
        let mut bits = bits.to_bitvec();
        bits.force_align();
        Self { bits }
    }
}

impl AsRef<BitSlice<u8, Msb0>> for BitStorage {
    #[inline]
    fn as_ref(&self) -> &BitSlice<u8, Msb0> {
        &self.bits
    }
}

impl Extend<bool> for BitStorage {
    #[inline]
    fn extend<T: IntoIterator<Item = bool>>(&mut self, iter: T) {
        self.bits.extend(iter);
    }
}

impl FromIterator<bool> for BitStorage {
    #[inline]
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

/// Binary string, e.g. `"0010110"`
impl FromStr for BitStorage {
    type Err = BitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                c => Err(BitsError::InvalidCharacter(c)),
            })
            .collect()
    }
}

impl Display for BitStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits.iter().by_vals() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.len(), self.to_hex_tagged())
    }
}

impl BitWriter for BitStorage {
    type Error = BitsError;

    #[inline]
    fn capacity_left(&self) -> usize {
        usize::MAX - self.len()
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        self.push_bit(bit);
        Ok(())
    }

    #[inline]
    fn write_bitslice(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        self.push_bits(bits);
        Ok(())
    }

    #[inline]
    fn repeat_bit(&mut self, n: usize, bit: bool) -> Result<(), Self::Error> {
        self.bits.resize(self.len() + n, bit);
        Ok(())
    }
}

/// Consumes all bits left in the reader
impl BitUnpack for BitStorage {
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        let mut bits = BitVec::repeat(false, reader.bits_left());
        reader.read_bits_into(&mut bits)?;
        Ok(bits.into())
    }
}
