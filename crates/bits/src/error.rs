use core::fmt::Display;
use std::error::Error as StdError;

use thiserror::Error as ThisError;

/// **De**/**ser**ialization error
pub trait Error: StdError + Sized {
    /// Returns a custom error from given message
    fn custom<T>(msg: T) -> Self
    where
        T: Display;

    /// Wraps current error in given context
    fn context<C>(self, context: C) -> Self
    where
        C: Display;
}

/// Adapter for providing context on [`Result`]
pub trait ResultExt: Sized {
    /// Wrap [`Err`] in context by calling given function
    fn with_context<C>(self, context: impl FnOnce() -> C) -> Self
    where
        C: Display;

    /// Wrap [`Err`] in given context
    #[inline]
    fn context<C>(self, context: C) -> Self
    where
        C: Display,
    {
        self.with_context(move || context)
    }
}

impl<T, E> ResultExt for Result<T, E>
where
    E: Error,
{
    #[inline]
    fn with_context<C>(self, context: impl FnOnce() -> C) -> Result<T, E>
    where
        C: Display,
    {
        self.map_err(move |err| err.context(context()))
    }
}

/// Error produced by bit storage, readers and writers of this crate
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum BitsError {
    /// Not enough elements left to satisfy a read.
    #[error("boundary: {requested} requested, only {available} left")]
    Boundary { requested: usize, available: usize },
    #[error("index {index} is out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid bit character: {0:?}")]
    InvalidCharacter(char),
    #[error("{value} cannot be stored in {bits} bits")]
    Overflow { value: String, bits: usize },
    #[error("{0}")]
    Custom(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<BitsError>,
    },
}

impl BitsError {
    /// Returns the innermost error, skipping all context layers
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            err => err,
        }
    }

    /// Whether the root cause is a [`BitsError::Boundary`]
    #[inline]
    pub fn is_boundary(&self) -> bool {
        matches!(self.root(), Self::Boundary { .. })
    }
}

impl Error for BitsError {
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
