//! Binary **de**serialization from bits
mod reader;

pub use self::reader::*;

use std::{rc::Rc, sync::Arc};

use bitvec::{order::Msb0, slice::BitSlice};
use either::Either;

use crate::{BitsError, ResultExt};

/// A type that can be bitwise-**de**serialized from any [`BitReader`].
pub trait BitUnpack: Sized {
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized;
}

#[inline]
pub fn unpack<T>(mut bits: &BitSlice<u8, Msb0>) -> Result<T, BitsError>
where
    T: BitUnpack,
{
    bits.unpack()
}

/// Same as [`unpack`] but fails if any bits are left
#[inline]
pub fn unpack_fully<T>(mut bits: &BitSlice<u8, Msb0>) -> Result<T, BitsError>
where
    T: BitUnpack,
{
    let v = bits.unpack()?;
    if !bits.is_empty() {
        return Err(BitsError::Custom(format!("{} more bits left", bits.len())));
    }
    Ok(v)
}

impl BitUnpack for () {
    #[inline]
    fn unpack<R>(_reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        Ok(())
    }
}

impl BitUnpack for bool {
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        reader.read_bit()
    }
}

macro_rules! impl_bit_unpack_for_tuple {
    ($($n:tt:$t:ident),+) => {
        impl<$($t),+> BitUnpack for ($($t,)+)
        where $(
            $t: BitUnpack,
        )+
        {
            #[inline]
            fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
            where
                R: BitReader + ?Sized,
            {
                Ok(($(
                    $t::unpack(reader).context(concat!(".", stringify!($n)))?,
                )+))
            }
        }
    };
}
impl_bit_unpack_for_tuple!(0:T0);
impl_bit_unpack_for_tuple!(0:T0,1:T1);
impl_bit_unpack_for_tuple!(0:T0,1:T1,2:T2);
impl_bit_unpack_for_tuple!(0:T0,1:T1,2:T2,3:T3);
impl_bit_unpack_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4);
impl_bit_unpack_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4,5:T5);

impl<T> BitUnpack for Box<T>
where
    T: BitUnpack,
{
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        T::unpack(reader).map(Box::new)
    }
}

impl<T> BitUnpack for Rc<T>
where
    T: BitUnpack,
{
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        T::unpack(reader).map(Rc::new)
    }
}

impl<T> BitUnpack for Arc<T>
where
    T: BitUnpack,
{
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        T::unpack(reader).map(Arc::new)
    }
}

impl<Left, Right> BitUnpack for Either<Left, Right>
where
    Left: BitUnpack,
    Right: BitUnpack,
{
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        match reader.unpack().context("tag")? {
            false => reader.unpack().map(Either::Left).context("left"),
            true => reader.unpack().map(Either::Right).context("right"),
        }
    }
}

/// [Maybe](https://docs.ton.org/develop/data-formats/tl-b-types#maybe)
impl<T> BitUnpack for Option<T>
where
    T: BitUnpack,
{
    #[inline]
    fn unpack<R>(reader: &mut R) -> Result<Self, R::Error>
    where
        R: BitReader + ?Sized,
    {
        match reader.unpack().context("tag")? {
            false => Ok(None),
            true => reader.unpack().map(Some).context("just"),
        }
    }
}
