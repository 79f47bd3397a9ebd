//! **De**serialization of values from [`Cell`]s
mod parser;

pub use self::parser::*;

use std::{rc::Rc, sync::Arc};

use crate::{
    Cell, CellError, ResultExt,
    bits::{
        BitStorage, BitUnpack, Either, Error,
        var::{Unary, VarUint},
    },
};

/// A type that can be **de**serialized from [`CellParser`].
pub trait CellDecode: Sized {
    /// Parse the value from [`CellParser`]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError>;
}

impl CellDecode for () {
    #[inline]
    fn decode(_parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        Ok(())
    }
}

/// Types with fixed bit representation are loaded inline
macro_rules! impl_cell_decode_via_bits {
    ($($t:ty),+) => {$(
        impl CellDecode for $t {
            #[inline]
            fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
                BitUnpack::unpack(parser)
            }
        }
    )+};
}
impl_cell_decode_via_bits! {
    bool,
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    Unary
}

/// Takes all bits left
impl CellDecode for BitStorage {
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        let n = parser.bits_left();
        parser.load_bits(n).map(Into::into)
    }
}

impl<const LEN_BITS: usize> CellDecode for VarUint<LEN_BITS> {
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        BitUnpack::unpack(parser)
    }
}

macro_rules! impl_cell_decode_for_tuple {
    ($($n:tt:$t:ident),+) => {
        impl<$($t),+> CellDecode for ($($t,)+)
        where $(
            $t: CellDecode,
        )+
        {
            #[inline]
            fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
                Ok(($(
                    $t::decode(parser).context(concat!(".", stringify!($n)))?,
                )+))
            }
        }
    };
}
impl_cell_decode_for_tuple!(0:T0);
impl_cell_decode_for_tuple!(0:T0,1:T1);
impl_cell_decode_for_tuple!(0:T0,1:T1,2:T2);
impl_cell_decode_for_tuple!(0:T0,1:T1,2:T2,3:T3);
impl_cell_decode_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4);
impl_cell_decode_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4,5:T5);

impl<T, const N: usize> CellDecode for [T; N]
where
    T: CellDecode,
{
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        let values: Vec<T> = parser.parse_iter().take(N).collect::<Result<_, _>>()?;
        values
            .try_into()
            .map_err(|v: Vec<T>| CellError::custom(format!("expected {N} values, got {}", v.len())))
    }
}

impl<T> CellDecode for Box<T>
where
    T: CellDecode,
{
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        T::decode(parser).map(Box::new)
    }
}

impl<T> CellDecode for Rc<T>
where
    T: CellDecode,
{
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        T::decode(parser).map(Rc::new)
    }
}

/// Implementation of [`Either X Y`](https://docs.ton.org/develop/data-formats/tl-b-types#either):
/// ```tlb
/// left$0 {X:Type} {Y:Type} value:X = Either X Y;
/// right$1 {X:Type} {Y:Type} value:Y = Either X Y;
/// ```
impl<L, R> CellDecode for Either<L, R>
where
    L: CellDecode,
    R: CellDecode,
{
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        Ok(match parser.load_bit()? {
            false => Either::Left(parser.parse().context("left")?),
            true => Either::Right(parser.parse().context("right")?),
        })
    }
}

/// Implementation of [`Maybe X`](https://docs.ton.org/develop/data-formats/tl-b-types#maybe):
/// ```tlb
/// nothing$0 {X:Type} = Maybe X;
/// just$1 {X:Type} value:X = Maybe X;
/// ```
impl<T> CellDecode for Option<T>
where
    T: CellDecode,
{
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        parser.parse_maybe()
    }
}

/// Takes next reference as is
impl CellDecode for Arc<Cell> {
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        parser.load_reference().cloned()
    }
}

/// Takes all data and references left
impl CellDecode for Cell {
    #[inline]
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        parser.load_remainder()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ser::CellEncodeExt, tests::assert_encode_decode_eq, types::LengthPrefixedString};

    use super::*;

    #[test]
    fn parse_fully_rejects_leftovers() {
        let cell = (1u8, 2u8).to_cell().unwrap();
        assert_eq!(cell.parse_fully::<(u8, u8)>().unwrap(), (1, 2));
        assert!(cell.parse_fully::<u8>().is_err());
    }

    #[test]
    fn tuple_error_has_context() {
        let cell = 1u8.to_cell().unwrap();
        let err = cell.parse_fully::<(u8, bool)>().unwrap_err();
        assert!(err.to_string().starts_with(".1: "), "{err}");
    }

    #[test]
    fn arrays() {
        let cell = [1u16, 2, 3].to_cell().unwrap();
        assert_eq!(cell.parse_fully::<[u16; 3]>().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn references_and_remainder() {
        let leaf = Arc::new(0xAAu8.to_cell().unwrap());
        let cell = (true, leaf.clone(), 7u8).to_cell().unwrap();
        let (flag, reference, rest) = cell.parse_fully::<(bool, Arc<Cell>, Cell)>().unwrap();
        assert!(flag);
        assert_eq!(reference, leaf);
        assert_eq!(rest, 7u8.to_cell().unwrap());
    }

    #[test]
    fn string_after_odd_bit() {
        assert_encode_decode_eq((true, LengthPrefixedString::new("hi").unwrap()));
    }

    #[test]
    fn bits_after_odd_bit() {
        let bits: BitStorage = "1011001110001".parse().unwrap();
        assert_encode_decode_eq((true, bits.clone()));

        let (_, decoded) = (false, bits.clone())
            .to_cell()
            .unwrap()
            .parse_fully::<(bool, BitStorage)>()
            .unwrap();
        assert_eq!(decoded.to_bytes(), bits.to_bytes());
    }

    #[test]
    fn remainder_after_odd_bit_keeps_hash() {
        let cell = (true, 7u8).to_cell().unwrap();
        let (flag, rest) = cell.parse_fully::<(bool, Cell)>().unwrap();
        assert!(flag);
        let expected = 7u8.to_cell().unwrap();
        assert_eq!(rest.bits().to_bytes(), [7]);
        assert_eq!(rest.hash_at(0), expected.hash_at(0));
        assert_eq!(rest, expected);
    }

    #[test]
    fn bytes_after_odd_bit() {
        let cell = (true, 0xABCDu16).to_cell().unwrap();
        let mut parser = cell.parser();
        assert!(parser.load_bit().unwrap());
        assert_eq!(parser.load_bytes(2).unwrap(), [0xAB, 0xCD]);
        parser.ensure_empty().unwrap();
    }

    #[test]
    fn either_and_maybe() {
        let value: (Either<u8, bool>, Option<u16>, Option<u8>) = (Either::Right(true), Some(5), None);
        let cell = value.to_cell().unwrap();
        assert_eq!(cell.bits().to_string(), "11100000000000001010");
        assert_eq!(cell.parse_fully::<(Either<u8, bool>, Option<u16>, Option<u8>)>().unwrap(), value);
    }
}
