//! [Cells](https://docs.ton.org/develop/data-formats/cell-boc#cell),
//! [Bag of Cells](https://docs.ton.org/develop/data-formats/cell-boc#bag-of-cells)
//! and [HashmapE](https://docs.ton.org/develop/data-formats/tl-b-types#hashmap)
//! serialization.
//!
//! ```rust
//! # use toncell::{BagOfCells, BocOptions, Cell, ser::CellEncodeExt};
//! let cell = (1u8, true).to_cell()?;
//! let boc = BagOfCells::from_root(cell.clone()).serialize(BocOptions::default())?;
//! let root = BagOfCells::deserialize(&boc)?.into_single_root().unwrap();
//! assert_eq!(*root, cell);
//! # Ok::<_, toncell::CellError>(())
//! ```
pub mod boc;
mod cell;
pub mod de;
pub mod dict;
mod error;
mod kind;
mod level_mask;
pub mod ser;
mod types;

pub use self::{
    boc::{BagOfCells, BoC, BocOptions},
    cell::*,
    dict::{DictionaryKey, DictionaryValue, HashmapE},
    error::*,
    kind::*,
    level_mask::*,
    types::*,
};

pub use tonbits::{self as bits, Either, ResultExt};

#[cfg(test)]
mod tests;
