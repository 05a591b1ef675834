//! Running native calls off the caller's task.

use quack_error::{QuackError, QuackResult, ResultExt};

/// Run a blocking native call on the tokio blocking pool and await its outcome.
///
/// The closure must own everything it touches; handles shared with it are kept alive by `Arc`s
/// so that dropping the returned future never frees memory the worker still uses.
pub(crate) async fn blocking<T, F>(f: F) -> QuackResult<T>
where
    F: FnOnce() -> QuackResult<T> + Send + 'static,
    T: Send + 'static,
{
    ResultExt::flatten(tokio::task::spawn_blocking(f).await.map_err(QuackError::from))
}
