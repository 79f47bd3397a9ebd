use std::sync::Arc;

use crate::{Cell, bits::BitStorage};

use super::Footprint;

/// Single step of a cell-building program, executed by
/// [`CellBuilder::execute`](super::CellBuilder::execute).
///
/// A `Vec<Command>` is itself [`CellEncode`](super::CellEncode), so
/// layouts can be assembled at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bit(bool),
    Bits(BitStorage),
    Bytes(Vec<u8>),
    /// Lowest `width` bits of `value` in two's complement
    Pattern {
        value: i128,
        width: usize,
    },
    Reference(Arc<Cell>),
    ContentsOf(Arc<Cell>),
    /// Commands executed in a new ordinary cell stored as a reference
    Child(Vec<Command>),
    /// Presence bit followed by the commands
    Maybe(Option<Vec<Command>>),
    /// Commands stored inline when they fit with `headroom` left, and in
    /// a child otherwise
    Either {
        commands: Vec<Command>,
        headroom: Footprint,
    },
}
