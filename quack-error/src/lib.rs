#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! This crate defines error & result types for Quack.
//! It also contains a variety of useful macros for error handling.

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::convert::Infallible;
use std::ffi::NulError;
use std::fmt::{Debug, Display, Formatter};
use std::num::TryFromIntError;
use std::ops::Deref;
use std::str::Utf8Error;
use std::fmt;

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Infallible> for QuackError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

/// The top-level error type for Quack.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum QuackError {
    /// The engine reported a failure status. The message is the engine's own error text.
    #[error("{0}\nBacktrace:\n{1}")]
    Native(ErrString, Backtrace),
    /// A (type, operation) pair that is not supported.
    #[error("{0}\nBacktrace:\n{1}")]
    UnsupportedType(ErrString, Backtrace),
    /// A value could not be converted to the declared type of its destination.
    #[error("{0}\nBacktrace:\n{1}")]
    TypeMismatch(ErrString, Backtrace),
    /// An appender row did not have exactly one value per column.
    #[error("{0}\nBacktrace:\n{1}")]
    ColumnCountMismatch(ErrString, Backtrace),
    /// An operation was attempted on an appender after it was closed.
    #[error("{0}\nBacktrace:\n{1}")]
    AppenderClosed(ErrString, Backtrace),
    /// A pending execution observed an interrupt of its connection.
    #[error("{0}\nBacktrace:\n{1}")]
    Interrupted(ErrString, Backtrace),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<QuackError>),
    /// A wrapper for Tokio join errors, raised when a worker running a native call fails.
    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
}

impl QuackError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        QuackError::Context(msg.into(), Box::new(self))
    }

    /// The message of the innermost error, without context or backtrace.
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            QuackError::Native(msg, _)
            | QuackError::UnsupportedType(msg, _)
            | QuackError::TypeMismatch(msg, _)
            | QuackError::ColumnCountMismatch(msg, _)
            | QuackError::AppenderClosed(msg, _)
            | QuackError::Interrupted(msg, _)
            | QuackError::InvalidArgument(msg, _) => Cow::Borrowed(msg.as_ref()),
            QuackError::OutOfBounds(idx, start, end, _) => {
                Cow::Owned(format!("index {idx} out of bounds from {start} to {end}"))
            }
            QuackError::Context(_, inner) => inner.message(),
            QuackError::JoinError(err) => Cow::Owned(err.to_string()),
        }
    }
}

impl Debug for QuackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<NulError> for QuackError {
    fn from(value: NulError) -> Self {
        QuackError::InvalidArgument(
            format!("string contains an interior NUL byte at {}", value.nul_position()).into(),
            Backtrace::capture(),
        )
    }
}

impl From<Utf8Error> for QuackError {
    fn from(value: Utf8Error) -> Self {
        QuackError::Native(
            format!("engine returned invalid UTF-8: {value}").into(),
            Backtrace::capture(),
        )
    }
}

impl From<TryFromIntError> for QuackError {
    fn from(value: TryFromIntError) -> Self {
        QuackError::InvalidArgument(value.to_string().into(), Backtrace::capture())
    }
}

/// A type alias for Results that return QuackErrors as their error type.
pub type QuackResult<T> = Result<T, QuackError>;

/// A convenient macro for creating a QuackError.
#[macro_export]
macro_rules! quack_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::QuackError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::QuackError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::quack_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a QuackError.
#[macro_export]
macro_rules! quack_bail {
    ($($tt:tt)+) => {
        return Err($crate::quack_err!($($tt)+))
    };
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::QuackError) -> crate::QuackError {
        error
    }
}
