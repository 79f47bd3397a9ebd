use core::iter;

use bitvec::{order::Msb0, slice::BitSlice, view::AsMutBits};
use impl_tools::autoimpl;

use crate::{BitPattern, BitStorage, BitUnpack, BitsError, Error, ResultExt};

/// Bitwise reader.
#[autoimpl(for <R: trait + ?Sized> &mut R, Box<R>)]
pub trait BitReader {
    type Error: Error;

    /// Returns number of bits left to read
    fn bits_left(&self) -> usize;

    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    #[inline]
    fn read_bits_into(&mut self, dst: &mut BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        for mut bit in dst.iter_mut() {
            *bit = self.read_bit()?
        }
        Ok(())
    }

    #[inline]
    fn skip(&mut self, n: usize) -> Result<(), Self::Error> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }
}

/// Extension helper for [`BitReader`].
pub trait BitReaderExt: BitReader {
    /// Reads next `n` bits into a new [`BitStorage`]
    #[inline]
    fn read_storage(&mut self, n: usize) -> Result<BitStorage, Self::Error> {
        let mut dst = BitStorage::repeating(false, n).into_bitvec();
        self.read_bits_into(&mut dst)?;
        Ok(dst.into())
    }

    #[inline]
    fn read_bytes_into(&mut self, mut dst: impl AsMut<[u8]>) -> Result<(), Self::Error> {
        self.read_bits_into(dst.as_mut_bits())
    }

    #[inline]
    fn read_bytes_array<const N: usize>(&mut self) -> Result<[u8; N], Self::Error> {
        let mut arr = [0; N];
        self.read_bits_into(arr.as_mut_bits())?;
        Ok(arr)
    }

    #[inline]
    fn read_bytes_vec(&mut self, n: usize) -> Result<Vec<u8>, Self::Error> {
        let mut v = vec![0; n];
        self.read_bytes_into(&mut v)?;
        Ok(v)
    }

    #[inline]
    fn unpack<T>(&mut self) -> Result<T, Self::Error>
    where
        T: BitUnpack,
    {
        T::unpack(self)
    }

    #[inline]
    fn unpack_iter<T>(&mut self) -> impl Iterator<Item = Result<T, Self::Error>> + '_
    where
        T: BitUnpack,
    {
        iter::repeat_with(move || self.unpack::<T>())
            .enumerate()
            .map(|(i, v)| v.with_context(|| format!("[{i}]")))
    }

    /// Reads next `width` bits as integer `T`, see [`BitPattern`]
    #[inline]
    fn unpack_pattern<T>(&mut self, width: usize) -> Result<T, Self::Error>
    where
        T: BitPattern,
    {
        self.read_storage(width).map(|bits| bits.pattern())
    }

    /// Reads a number in unary form
    #[inline]
    fn unpack_unary(&mut self) -> Result<usize, Self::Error> {
        let mut n = 0;
        while self.read_bit()? {
            n += 1;
        }
        Ok(n)
    }

    /// Borrows reader, rather than consuming it.
    #[inline]
    fn as_mut(&mut self) -> &mut Self {
        self
    }
}
impl<T> BitReaderExt for T where T: BitReader + ?Sized {}

impl BitReader for &BitSlice<u8, Msb0> {
    type Error = BitsError;

    #[inline]
    fn bits_left(&self) -> usize {
        self.len()
    }

    #[inline]
    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        let (bit, rest) = self.split_first().ok_or(BitsError::Boundary {
            requested: 1,
            available: 0,
        })?;
        *self = rest;
        Ok(*bit)
    }

    #[inline]
    fn read_bits_into(&mut self, dst: &mut BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        if self.len() < dst.len() {
            return Err(BitsError::Boundary {
                requested: dst.len(),
                available: self.len(),
            });
        }
        let (v, rest) = self.split_at(dst.len());
        dst.copy_from_bitslice(v);
        *self = rest;
        Ok(())
    }

    #[inline]
    fn skip(&mut self, n: usize) -> Result<(), Self::Error> {
        if self.len() < n {
            return Err(BitsError::Boundary {
                requested: n,
                available: self.len(),
            });
        }
        let (_, rest) = self.split_at(n);
        *self = rest;
        Ok(())
    }
}
