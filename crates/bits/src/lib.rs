//! Bit storage, cursors and bitwise **ser**ialization/**de**serialization
//! primitives for TON cells.
mod continuous;
pub mod de;
mod error;
pub mod integer;
pub mod ser;
mod storage;
pub mod var;

pub use self::{
    continuous::*,
    de::{BitReader, BitReaderExt, BitUnpack, unpack, unpack_fully},
    error::*,
    integer::BitPattern,
    ser::{BitPack, BitWriter, BitWriterExt, pack},
    storage::*,
};

pub use ::either::Either;
pub use bitvec;

#[cfg(test)]
mod tests;
