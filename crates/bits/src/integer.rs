//! Integer bit patterns
use bitvec::{order::Msb0, slice::BitSlice, view::AsBits};

use crate::{BitPack, BitReader, BitReaderExt, BitUnpack, BitWriter};

/// Fixed-width integer that can be projected onto / restored from an
/// arbitrary number of bits.
///
/// Projection is raw two's-complement truncation: only the lowest `width`
/// bits are kept, most significant first. Widths wider than the type are
/// sign-extended for signed types and zero-extended for unsigned ones.
pub trait BitPattern: Copy {
    /// Native width of the type in bits
    const BITS: usize;

    /// Returns the bit at `position` counted from the least significant one.
    /// Positions beyond [`BITS`](BitPattern::BITS) yield the extension bit.
    fn bit_at(self, position: usize) -> bool;

    /// Re-interprets given bits as this type.
    ///
    /// Signed types are sign-extended from the first bit, empty input
    /// yields zero.
    fn from_pattern(bits: &BitSlice<u8, Msb0>) -> Self;

    /// Iterates over lowest `width` bits of the value, most significant first
    #[inline]
    fn pattern_bits(self, width: usize) -> impl Iterator<Item = bool> {
        (0..width).rev().map(move |i| self.bit_at(i))
    }
}

macro_rules! impl_bit_pattern {
    (@unsigned $($t:tt)+) => {$(
        impl BitPattern for $t {
            const BITS: usize = $t::BITS as usize;

            #[inline]
            fn bit_at(self, position: usize) -> bool {
                position < <Self as BitPattern>::BITS && (self >> position) & 1 == 1
            }

            #[inline]
            fn from_pattern(bits: &BitSlice<u8, Msb0>) -> Self {
                bits.iter()
                    .by_vals()
                    .fold(0, |acc, bit| (acc << 1) | bit as $t)
            }
        }
    )+};
    (@signed $($t:tt)+) => {$(
        impl BitPattern for $t {
            const BITS: usize = $t::BITS as usize;

            #[inline]
            fn bit_at(self, position: usize) -> bool {
                if position >= <Self as BitPattern>::BITS {
                    return self < 0;
                }
                (self >> position) & 1 == 1
            }

            #[inline]
            fn from_pattern(bits: &BitSlice<u8, Msb0>) -> Self {
                let Some(sign) = bits.first().map(|b| *b) else {
                    return 0;
                };
                bits.iter()
                    .by_vals()
                    .fold(if sign { -1 } else { 0 }, |acc, bit| (acc << 1) | bit as $t)
            }
        }
    )+};
}
impl_bit_pattern! { @unsigned u8 u16 u32 u64 u128 usize }
impl_bit_pattern! { @signed i8 i16 i32 i64 i128 isize }

macro_rules! impl_bit_serde_for_integers {
    ($($t:tt)+) => {$(
        impl BitPack for $t {
            #[inline]
            fn pack<W>(&self, writer: &mut W) -> Result<(), W::Error>
            where
                W: BitWriter + ?Sized,
            {
                writer.write_bitslice(self.to_be_bytes().as_bits::<Msb0>())
            }
        }

        impl BitUnpack for $t {
            #[inline]
            fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
            where
                R: BitReader + ?Sized,
            {
                reader.read_bytes_array().map(Self::from_be_bytes)
            }
        }
    )+};
}
impl_bit_serde_for_integers! {
    u8 u16 u32 u64 u128 usize
    i8 i16 i32 i64 i128 isize
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::BitStorage;

    use super::*;

    fn project<T: BitPattern>(value: T, width: usize) -> BitStorage {
        let mut bits = BitStorage::new();
        bits.push_pattern(value, width);
        bits
    }

    #[rstest]
    #[case(0u8, 0, "")]
    #[case(1u8, 8, "00000001")]
    #[case(0b101u8, 2, "01")]
    #[case(0xffu8, 9, "011111111")]
    #[case(-1i8, 9, "111111111")]
    #[case(-2i8, 3, "110")]
    #[case(5i8, 1, "1")]
    fn projects_pattern<T: BitPattern>(
        #[case] value: T,
        #[case] width: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(project(value, width).to_string(), expected);
    }

    macro_rules! pattern_fidelity {
        ($($name:ident: $t:ty),+ $(,)?) => {$(
            #[test]
            fn $name() {
                const W: usize = <$t as BitPattern>::BITS;
                for value in [<$t>::MIN, <$t>::MAX, 0 as $t, 1 as $t, (<$t>::MAX / 3) as $t] {
                    // full and extended widths are lossless
                    for width in [W, W + 1] {
                        let bits = project(value, width);
                        assert_eq!(bits.len(), width);
                        assert_eq!(bits.pattern::<$t>(), value, "{value} @ {width}");
                    }

                    assert_eq!(project(value, 0).pattern::<$t>(), 0 as $t);

                    // a single bit keeps only the lowest one
                    let lowest = project(value, 1).pattern::<$t>();
                    let expected = if <$t>::MIN == 0 as $t {
                        value & 1
                    } else {
                        (0 as $t).wrapping_sub(value & 1)
                    };
                    assert_eq!(lowest, expected, "{value} @ 1");
                }
            }
        )+};
    }
    pattern_fidelity! {
        u8_pattern: u8,
        u16_pattern: u16,
        u32_pattern: u32,
        u64_pattern: u64,
        u128_pattern: u128,
        i8_pattern: i8,
        i16_pattern: i16,
        i32_pattern: i32,
        i64_pattern: i64,
        i128_pattern: i128,
    }

    #[test]
    fn integers_pack_big_endian() {
        let mut bits = BitStorage::new();
        crate::ser::BitWriterExt::pack(&mut bits, 0x0102u16).unwrap();
        assert_eq!(bits.to_bytes(), [0x01, 0x02]);
        assert_eq!(bits.as_bitslice().unpack::<u16>().unwrap(), 0x0102);
    }
}
