use crate::{
    CellError,
    bits::{
        BitPattern, BitStorage, BitsError,
        bitvec::{order::Msb0, slice::BitSlice},
    },
};

/// Key of a [`HashmapE`](super::HashmapE), stored as a fixed-width bit
/// string
pub trait DictionaryKey: Sized {
    /// Width of the natural representation, `None` for keys of any width
    const BITS: Option<usize>;

    /// Bits of the key, exactly `width` of them
    fn to_key_bits(&self, width: usize) -> Result<BitStorage, CellError>;

    fn from_key_bits(bits: &BitSlice<u8, Msb0>) -> Result<Self, CellError>;
}

/// Integers are stored as big-endian bit patterns and must survive the
/// round trip through the key width
macro_rules! impl_dictionary_key_for_integers {
    ($($t:ty)+) => {$(
        impl DictionaryKey for $t {
            const BITS: Option<usize> = Some(<$t as BitPattern>::BITS);

            #[inline]
            fn to_key_bits(&self, width: usize) -> Result<BitStorage, CellError> {
                let mut bits = BitStorage::with_capacity(width);
                bits.push_pattern(*self, width);
                if bits.pattern::<$t>() != *self {
                    return Err(BitsError::Overflow {
                        value: self.to_string(),
                        bits: width,
                    }
                    .into());
                }
                Ok(bits)
            }

            #[inline]
            fn from_key_bits(bits: &BitSlice<u8, Msb0>) -> Result<Self, CellError> {
                let value = <$t>::from_pattern(bits);
                if !value.pattern_bits(bits.len()).eq(bits.iter().by_vals()) {
                    return Err(BitsError::Overflow {
                        value: BitStorage::from(bits).to_hex_tagged(),
                        bits: <$t as BitPattern>::BITS,
                    }
                    .into());
                }
                Ok(value)
            }
        }
    )+};
}
impl_dictionary_key_for_integers! {
    u8 u16 u32 u64 u128 usize
    i8 i16 i32 i64 i128 isize
}

impl DictionaryKey for BitStorage {
    const BITS: Option<usize> = None;

    #[inline]
    fn to_key_bits(&self, width: usize) -> Result<BitStorage, CellError> {
        if self.len() != width {
            return Err(CellError::KeyWidthMismatch {
                expected: width,
                actual: self.len(),
            });
        }
        Ok(self.clone())
    }

    #[inline]
    fn from_key_bits(bits: &BitSlice<u8, Msb0>) -> Result<Self, CellError> {
        Ok(bits.into())
    }
}
