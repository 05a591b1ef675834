use crate::{ErrString, QuackResult};

/// Extension trait for nested [`QuackResult`]s.
pub trait ResultExt<T>: private::Sealed {
    /// Flatten a nested [`QuackResult`]. Helper function until <https://github.com/rust-lang/rust/issues/70142> is stabilized.
    fn flatten(self) -> QuackResult<T>;
}

mod private {
    use crate::QuackResult;

    pub trait Sealed {}

    impl<T> Sealed for QuackResult<QuackResult<T>> {}
}

impl<T> ResultExt<T> for QuackResult<QuackResult<T>> {
    fn flatten(self) -> QuackResult<T> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) | Err(e) => Err(e),
        }
    }
}

/// Attach context to the error side of a [`QuackResult`].
pub trait ContextExt<T> {
    /// Wraps the error, if any, with a lazily built context message.
    fn with_context<M: Into<ErrString>, F: FnOnce() -> M>(self, f: F) -> QuackResult<T>;
}

impl<T> ContextExt<T> for QuackResult<T> {
    fn with_context<M: Into<ErrString>, F: FnOnce() -> M>(self, f: F) -> QuackResult<T> {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QuackError, quack_err};

    #[test]
    fn flatten_nested() {
        let ok: QuackResult<QuackResult<u8>> = Ok(Ok(3));
        assert_eq!(ResultExt::flatten(ok).unwrap(), 3);

        let inner: QuackResult<QuackResult<u8>> = Ok(Err(quack_err!(Native: "inner")));
        assert!(ResultExt::flatten(inner).unwrap_err().to_string().contains("inner"));

        let outer: QuackResult<QuackResult<u8>> = Err(quack_err!(Native: "outer"));
        assert!(ResultExt::flatten(outer).unwrap_err().to_string().contains("outer"));
    }

    #[test]
    fn context_wraps() {
        let res: QuackResult<u8> = Err(quack_err!(Native: "boom"));
        let err = res.with_context(|| "while testing").unwrap_err();
        assert!(matches!(err, QuackError::Context(..)));
        assert!(err.to_string().starts_with("while testing: boom"));
    }
}
