use core::fmt::Display;

use strum::Display as StrumDisplay;
use thiserror::Error as ThisError;

use crate::{
    CellKind,
    bits::{BitsError, Error},
};

/// Which side of a [`CellKind`] bound was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Bound {
    Min,
    Max,
}

/// Constrained property of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum CellProperty {
    Bits,
    References,
}

/// Error produced while building, parsing or (de)serializing cells
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum CellError {
    /// Bit or reference count is outside of bounds of the cell kind
    #[error("{kind} cell {property}: {count} violates {bound} bound")]
    Constraint {
        kind: CellKind,
        bound: Bound,
        property: CellProperty,
        count: usize,
    },
    #[error("expected {expected} cell, got {actual}")]
    KindMismatch { expected: CellKind, actual: CellKind },
    #[error("cell graph contains a cycle")]
    TopologicalCycle,
    #[error("empty root cells")]
    EmptyRootCells,
    #[error("{field} needs {bytes} bytes, which is more than {max}")]
    ByteWidthOverflow {
        field: &'static str,
        bytes: usize,
        max: usize,
    },
    #[error("cache bits are not supported")]
    CacheBitsUnsupported,
    #[error("invalid BoC magic: {0:#010x}")]
    InvalidMagic(u32),
    #[error("CRC32c mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Crc32cMismatch { stored: u32, computed: u32 },
    #[error("unknown exotic cell kind: {0}")]
    UnknownExoticKind(u8),
    #[error("root index {index} is out of {cells} cells")]
    InvalidRootIndex { index: usize, cells: usize },
    #[error("cell [{cell}] references invalid index {reference}")]
    InvalidReferenceIndex { cell: usize, reference: usize },
    #[error("stored level mask {stored:#05b} does not match computed {computed:#05b}")]
    LevelMismatch { stored: u8, computed: u8 },
    #[error("cell depth {depth} exceeds maximum {max}")]
    DepthOverflow { depth: u16, max: u16 },
    #[error("key width mismatch: expected {expected} bits, got {actual}")]
    KeyWidthMismatch { expected: usize, actual: usize },
    #[error("invalid {what}: {value}")]
    InvalidDiscriminant { what: &'static str, value: u64 },
    #[error(transparent)]
    Bits(#[from] BitsError),
    #[error("{0}")]
    Custom(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<CellError>,
    },
}

impl CellError {
    /// Returns the innermost error, skipping all context layers
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            err => err,
        }
    }

    #[inline]
    pub(crate) fn constraint(
        kind: CellKind,
        bound: Bound,
        property: CellProperty,
        count: usize,
    ) -> Self {
        Self::Constraint {
            kind,
            bound,
            property,
            count,
        }
    }
}

impl Error for CellError {
    #[inline]
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Self::Custom(msg.to_string())
    }

    #[inline]
    fn context<C>(self, context: C) -> Self
    where
        C: Display,
    {
        Self::Context {
            context: context.to_string(),
            source: Box::new(self),
        }
    }
}
