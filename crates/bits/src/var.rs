//! Variable-length numbers
use core::fmt::{self, Display};

use num_bigint::BigUint;
use num_traits::Zero;

use crate::{BitPack, BitReader, BitReaderExt, BitUnpack, BitWriter, BitWriterExt, Error, ResultExt};

/// Natural number in unary form
/// ```tlb
/// unary_zero$0 = Unary ~0;
/// unary_succ$1 {n:#} x:(Unary ~n) = Unary ~(n + 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Unary(pub usize);

impl BitPack for Unary {
    #[inline]
    fn pack<W>(&self, writer: &mut W) -> Result<(), W::Error>
    where
        W: BitWriter + ?Sized,
    {
        writer.pack_unary(self.0)?;
        Ok(())
    }
}

impl BitUnpack for Unary {
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        reader.unpack_unary().map(Self)
    }
}

/// Unsigned integer prefixed by its byte length stored in `LEN_BITS` bits
/// ```tlb
/// var_uint$_ {n:#} len:(#< n) value:(uint (len * 8)) = VarUInteger n;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarUint<const LEN_BITS: usize>(pub BigUint);

/// ```tlb
/// nanograms$_ amount:(VarUInteger 16) = Grams;
/// ```
pub type Coins = VarUint<4>;

impl<const LEN_BITS: usize> VarUint<LEN_BITS> {
    /// Largest byte length representable in `LEN_BITS` bits
    pub const MAX_BYTES: usize = (1 << LEN_BITS) - 1;
}

macro_rules! impl_var_uint_from {
    ($($t:ident)+) => {$(
        impl<const LEN_BITS: usize> From<$t> for VarUint<LEN_BITS> {
            #[inline]
            fn from(value: $t) -> Self {
                Self(value.into())
            }
        }
    )+};
}
impl_var_uint_from! { u8 u16 u32 u64 u128 usize BigUint }

impl<const LEN_BITS: usize> Display for VarUint<LEN_BITS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<const LEN_BITS: usize> BitPack for VarUint<LEN_BITS> {
    fn pack<W>(&self, writer: &mut W) -> Result<(), W::Error>
    where
        W: BitWriter + ?Sized,
    {
        let bytes = if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        };
        if bytes.len() > Self::MAX_BYTES {
            return Err(Error::custom(format!(
                "{} does not fit into {} bytes",
                self.0,
                Self::MAX_BYTES
            )));
        }
        writer
            .pack_pattern(bytes.len(), LEN_BITS)
            .context("len")?
            .with_bytes(bytes)
            .context("value")?;
        Ok(())
    }
}

impl<const LEN_BITS: usize> BitUnpack for VarUint<LEN_BITS> {
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        let len: usize = reader.unpack_pattern(LEN_BITS).context("len")?;
        let bytes = reader.read_bytes_vec(len).context("value")?;
        Ok(Self(BigUint::from_bytes_be(&bytes)))
    }
}
