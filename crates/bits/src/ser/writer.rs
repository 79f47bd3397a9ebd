use bitvec::{order::Msb0, slice::BitSlice};
use impl_tools::autoimpl;

use crate::{BitPattern, Error, ResultExt};

use super::BitPack;

/// Bitwise writer.
#[autoimpl(for <W: trait + ?Sized> &mut W, Box<W>)]
pub trait BitWriter {
    // An error ocurred while writing
    type Error: Error;

    /// Returns remaining capacity in bits
    fn capacity_left(&self) -> usize;

    /// Writes a single bit.
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;

    /// Writes given bitslice.
    /// Might be optimized by the implementation.
    #[inline]
    fn write_bitslice(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        for bit in bits.iter().by_vals() {
            self.write_bit(bit)?;
        }
        Ok(())
    }

    /// Writes given `bit` exactly `n` times.
    /// Might be optimized by the implementation.
    #[inline]
    fn repeat_bit(&mut self, n: usize, bit: bool) -> Result<(), Self::Error> {
        for _ in 0..n {
            self.write_bit(bit)?;
        }
        Ok(())
    }
}

/// Extension helper for [`BitWriter`].
pub trait BitWriterExt: BitWriter {
    /// Same as [`.repeat_bit()`](BitWriter::repeat_bit) but can be used
    /// for chaining
    #[inline]
    fn with_repeat_bit(&mut self, n: usize, bit: bool) -> Result<&mut Self, Self::Error> {
        self.repeat_bit(n, bit)?;
        Ok(self)
    }

    /// Writes given bytes
    #[inline]
    fn with_bytes(&mut self, bytes: impl AsRef<[u8]>) -> Result<&mut Self, Self::Error> {
        self.write_bitslice(BitSlice::from_slice(bytes.as_ref()))?;
        Ok(self)
    }

    /// Pack given value using its [`BitPack`] implementation
    #[inline]
    fn pack<T>(&mut self, value: T) -> Result<&mut Self, Self::Error>
    where
        T: BitPack,
    {
        value.pack(self)?;
        Ok(self)
    }

    /// Pack all values from given iterator using [`BitPack`] implementation
    /// of its item type.
    #[inline]
    fn pack_many<T>(&mut self, values: impl IntoIterator<Item = T>) -> Result<&mut Self, Self::Error>
    where
        T: BitPack,
    {
        for (i, v) in values.into_iter().enumerate() {
            self.pack(v).with_context(|| format!("[{i}]"))?;
        }
        Ok(self)
    }

    /// Writes lowest `width` bits of given integer, see [`BitPattern`]
    #[inline]
    fn pack_pattern<T>(&mut self, value: T, width: usize) -> Result<&mut Self, Self::Error>
    where
        T: BitPattern,
    {
        if width > self.capacity_left() {
            return Err(Error::custom(format!(
                "{width} bits requested, only {} left",
                self.capacity_left()
            )));
        }
        for bit in value.pattern_bits(width) {
            self.write_bit(bit)?;
        }
        Ok(self)
    }

    /// Writes `n` in unary form:
    /// ```tlb
    /// unary_zero$0 = Unary ~0;
    /// unary_succ$1 {n:#} x:(Unary ~n) = Unary ~(n + 1);
    /// ```
    #[inline]
    fn pack_unary(&mut self, n: usize) -> Result<&mut Self, Self::Error> {
        self.with_repeat_bit(n, true)?.pack(false)
    }

    /// Borrows writer, rather than consuming it.
    #[inline]
    fn as_mut(&mut self) -> &mut Self {
        self
    }
}
impl<T> BitWriterExt for T where T: BitWriter + ?Sized {}

/// Binary string, e.g. `"0010110...."`
impl BitWriter for String {
    type Error = crate::BitsError;

    #[inline]
    fn capacity_left(&self) -> usize {
        usize::MAX - self.len()
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        self.push(if bit { '1' } else { '0' });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use either::Either;

    use super::*;

    #[test]
    fn string_writer() {
        let mut s = String::new();
        s.pack(true)
            .unwrap()
            .pack_unary(3)
            .unwrap()
            .pack_pattern(-1i8, 2)
            .unwrap();
        assert_eq!(s, "1111011");
    }

    #[test]
    fn maybe_and_either_tags() {
        let mut s = String::new();
        s.pack(Some(true))
            .unwrap()
            .pack(None::<bool>)
            .unwrap()
            .pack(Either::<bool, u8>::Right(3))
            .unwrap();
        assert_eq!(s, "110100000011");
    }
}
