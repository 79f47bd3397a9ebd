//! **Ser**ialization of values into [`Cell`]s
mod builder;
mod command;

pub use self::{builder::*, command::*};

use std::{rc::Rc, sync::Arc};

use impl_tools::autoimpl;

use crate::{
    Cell, CellError, ResultExt,
    bits::{
        BitPack, BitStorage, BitWriterExt, Either,
        bitvec::{order::Msb0, slice::BitSlice},
        var::{Unary, VarUint},
    },
};

/// A type that can be **ser**ialized into [`CellBuilder`].
#[autoimpl(for <T: trait + ?Sized> &T, &mut T, Box<T>, Rc<T>)]
pub trait CellEncode {
    /// Store the value into [`CellBuilder`]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError>;
}

/// Space a value occupies inside a single cell
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footprint {
    pub bits: usize,
    pub references: usize,
}

pub trait CellEncodeExt: CellEncode {
    /// Encode the value into a new ordinary [`Cell`]
    #[inline]
    fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = Cell::builder();
        self.encode(&mut builder)?;
        builder.build()
    }

    /// Bits and references the value takes when stored inline
    #[inline]
    fn footprint(&self) -> Result<Footprint, CellError> {
        let mut builder = Cell::builder();
        self.encode(&mut builder)?;
        Ok(Footprint {
            bits: builder.bits().len(),
            references: builder.references().len(),
        })
    }
}
impl<T> CellEncodeExt for T where T: CellEncode + ?Sized {}

impl CellEncode for () {
    #[inline]
    fn encode(&self, _builder: &mut CellBuilder) -> Result<(), CellError> {
        Ok(())
    }
}

/// Types with fixed bit representation are stored inline
macro_rules! impl_cell_encode_via_bits {
    ($($t:ty),+) => {$(
        impl CellEncode for $t {
            #[inline]
            fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
                BitPack::pack(self, builder)
            }
        }
    )+};
}
impl_cell_encode_via_bits! {
    bool,
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    BitSlice<u8, Msb0>, Unary
}

impl CellEncode for BitStorage {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_bits(self)?;
        Ok(())
    }
}

impl<const LEN_BITS: usize> CellEncode for VarUint<LEN_BITS> {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.pack(self)?;
        Ok(())
    }
}

macro_rules! impl_cell_encode_for_tuple {
    ($($n:tt:$t:ident),+) => {
        impl<$($t),+> CellEncode for ($($t,)+)
        where $(
            $t: CellEncode,
        )+
        {
            #[inline]
            fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
                builder$(
                    .store(&self.$n).context(concat!(".", stringify!($n)))?)+;
                Ok(())
            }
        }
    };
}
impl_cell_encode_for_tuple!(0:T0);
impl_cell_encode_for_tuple!(0:T0,1:T1);
impl_cell_encode_for_tuple!(0:T0,1:T1,2:T2);
impl_cell_encode_for_tuple!(0:T0,1:T1,2:T2,3:T3);
impl_cell_encode_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4);
impl_cell_encode_for_tuple!(0:T0,1:T1,2:T2,3:T3,4:T4,5:T5);

/// Values are stored one after another with no length prefix
impl<T> CellEncode for [T]
where
    T: CellEncode,
{
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_many(self)?;
        Ok(())
    }
}

impl<T, const N: usize> CellEncode for [T; N]
where
    T: CellEncode,
{
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        self.as_slice().encode(builder)
    }
}

/// Implementation of [`Either X Y`](https://docs.ton.org/develop/data-formats/tl-b-types#either):
/// ```tlb
/// left$0 {X:Type} {Y:Type} value:X = Either X Y;
/// right$1 {X:Type} {Y:Type} value:Y = Either X Y;
/// ```
impl<L, R> CellEncode for Either<L, R>
where
    L: CellEncode,
    R: CellEncode,
{
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        match self {
            Self::Left(l) => builder.store_bit(false)?.store(l).context("left")?,
            Self::Right(r) => builder.store_bit(true)?.store(r).context("right")?,
        };
        Ok(())
    }
}

/// Implementation of [`Maybe X`](https://docs.ton.org/develop/data-formats/tl-b-types#maybe):
/// ```tlb
/// nothing$0 {X:Type} = Maybe X;
/// just$1 {X:Type} value:X = Maybe X;
/// ```
impl<T> CellEncode for Option<T>
where
    T: CellEncode,
{
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_maybe(self.as_ref())?;
        Ok(())
    }
}

/// Cells are stored as references
impl CellEncode for Arc<Cell> {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_reference(self.clone())?;
        Ok(())
    }
}

/// Owned cell contributes its data and references to the builder
impl CellEncode for Cell {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_contents_of(self)?;
        Ok(())
    }
}

impl CellEncode for [Command] {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.execute(self)?;
        Ok(())
    }
}

impl CellEncode for Vec<Command> {
    #[inline]
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        self.as_slice().encode(builder)
    }
}
