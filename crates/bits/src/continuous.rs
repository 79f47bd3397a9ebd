use core::ops::Range;

use bitvec::{order::Msb0, slice::BitSlice};

use crate::{BitReader, BitsError};

/// Random-access sequence that [`ContinuousReader`] can walk over
pub trait Sequence {
    type Element<'a>
    where
        Self: 'a;

    fn length(&self) -> usize;

    /// Element at `index`, which is always in bounds
    fn element(&self, index: usize) -> Self::Element<'_>;

    /// Sub-sequence at `range`, which is always in bounds
    fn range(&self, range: Range<usize>) -> &Self;
}

impl Sequence for BitSlice<u8, Msb0> {
    type Element<'a> = bool;

    #[inline]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline]
    fn element(&self, index: usize) -> bool {
        self[index]
    }

    #[inline]
    fn range(&self, range: Range<usize>) -> &Self {
        &self[range]
    }
}

impl<T> Sequence for [T] {
    type Element<'a>
        = &'a T
    where
        T: 'a;

    #[inline]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline]
    fn element(&self, index: usize) -> &T {
        &self[index]
    }

    #[inline]
    fn range(&self, range: Range<usize>) -> &Self {
        &self[range]
    }
}

/// Forward cursor over a borrowed [`Sequence`].
///
/// Any read past the end fails with [`BitsError::Boundary`] and leaves
/// the position untouched.
#[derive(Debug)]
pub struct ContinuousReader<'a, S>
where
    S: Sequence + ?Sized,
{
    data: &'a S,
    position: usize,
}

impl<'a, S> ContinuousReader<'a, S>
where
    S: Sequence + ?Sized,
{
    #[inline]
    pub const fn new(data: &'a S) -> Self {
        Self { data, position: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.length() - self.position
    }

    #[inline]
    fn ensure(&self, n: usize) -> Result<(), BitsError> {
        let available = self.remaining();
        if n > available {
            return Err(BitsError::Boundary {
                requested: n,
                available,
            });
        }
        Ok(())
    }

    /// Reads next element
    #[inline]
    pub fn read(&mut self) -> Result<S::Element<'a>, BitsError> {
        self.ensure(1)?;
        let element = self.data.element(self.position);
        self.position += 1;
        Ok(element)
    }

    /// Reads next `n` elements as a sub-sequence
    #[inline]
    pub fn read_n(&mut self, n: usize) -> Result<&'a S, BitsError> {
        self.ensure(n)?;
        let range = self.data.range(self.position..self.position + n);
        self.position += n;
        Ok(range)
    }

    /// Moves `n` elements back
    #[inline]
    pub fn rewind(&mut self, n: usize) -> Result<(), BitsError> {
        if n > self.position {
            return Err(BitsError::Boundary {
                requested: n,
                available: self.position,
            });
        }
        self.position -= n;
        Ok(())
    }

    /// Consumes everything left
    #[inline]
    pub fn fast_forward(&mut self) -> &'a S {
        let rest = self.rest();
        self.position = self.data.length();
        rest
    }

    /// Everything left, without consuming it
    #[inline]
    pub fn rest(&self) -> &'a S {
        self.data.range(self.position..self.data.length())
    }
}

impl<S> Clone for ContinuousReader<'_, S>
where
    S: Sequence + ?Sized,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            position: self.position,
        }
    }
}

impl BitReader for ContinuousReader<'_, BitSlice<u8, Msb0>> {
    type Error = BitsError;

    #[inline]
    fn bits_left(&self) -> usize {
        self.remaining()
    }

    #[inline]
    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        self.read()
    }

    #[inline]
    fn read_bits_into(&mut self, dst: &mut BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        dst.copy_from_bitslice(self.read_n(dst.len())?);
        Ok(())
    }

    #[inline]
    fn skip(&mut self, n: usize) -> Result<(), Self::Error> {
        self.read_n(n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::{BitReaderExt, BitStorage};

    use super::*;

    #[test]
    fn reads_bits() {
        let bits: BitStorage = "1011001".parse().unwrap();
        let mut reader = ContinuousReader::new(bits.as_bitslice());

        assert_eq!(reader.read(), Ok(true));
        assert_eq!(BitStorage::from(reader.read_n(3).unwrap()).to_string(), "011");
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.remaining(), 3);
        assert_eq!(BitStorage::from(reader.rest()).to_string(), "001");
        assert_eq!(reader.position(), 4);

        reader.rewind(2).unwrap();
        assert_eq!(reader.unpack_pattern::<u8>(4).unwrap(), 0b1100);

        assert_eq!(
            reader.read_n(2),
            Err(BitsError::Boundary {
                requested: 2,
                available: 1
            })
        );
        assert_eq!(reader.position(), 6);
        assert_eq!(BitStorage::from(reader.fast_forward()).to_string(), "1");
        assert_eq!(
            reader.read(),
            Err(BitsError::Boundary {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn rewind_past_start_fails() {
        let bits = BitStorage::repeating(true, 4);
        let mut reader = ContinuousReader::new(bits.as_bitslice());
        reader.read_n(2).unwrap();
        assert!(reader.rewind(3).is_err());
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn reads_slices() {
        let children = ["a", "b", "c"];
        let mut reader = ContinuousReader::new(children.as_slice());

        assert_eq!(reader.read(), Ok(&"a"));
        assert_eq!(reader.read_n(2), Ok(["b", "c"].as_slice()));
        assert!(reader.read().is_err());
        assert!(reader.fast_forward().is_empty());
    }
}
