use std::error::Error as StdError;
use std::fmt;

/// A boxed, type-erased cause, used so `PoolError` doesn't need to be
/// generic over the factory's own error type.
pub(crate) type Cause = Box<dyn StdError + Send + Sync>;

/// Returned by [`crate::new_pool`] when the requested configuration is
/// invalid.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// `idle_timeout_s` was below the 0.5s floor.
    IdleTimeoutTooShort {
        /// The value that was rejected.
        requested: f64,
    },
    /// `max_resources` was zero.
    MaxResourcesZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IdleTimeoutTooShort { requested } => write!(
                f,
                "idle_timeout must be >= 0.5s, got {requested}s"
            ),
            ConfigError::MaxResourcesZero => write!(f, "max_resources must be >= 1"),
        }
    }
}

impl StdError for ConfigError {}

/// Errors surfaced to callers of [`crate::Pool::take`] and
/// [`crate::Pool::with_resource`].
///
/// `DestroyFailure` never appears here: per the pool's error-handling
/// policy, destructor failures are swallowed and only logged, so that one
/// broken resource can't block the return or reclamation of others.
#[derive(Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// The factory's `create` callback failed. The stripe's `available`
    /// counter has already been restored by the time this is returned.
    CreateFailed(Cause),
    /// The user-supplied closure passed to `with_resource` failed. The
    /// resource that was lent to it has already been destroyed, not
    /// returned, by the time this is returned.
    CallbackFailed(Cause),
}

impl PoolError {
    pub(crate) fn create_failed<E>(err: E) -> Self
    where
        E: Into<Cause>,
    {
        PoolError::CreateFailed(err.into())
    }

    pub(crate) fn callback_failed<E>(err: E) -> Self
    where
        E: Into<Cause>,
    {
        PoolError::CallbackFailed(err.into())
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::CreateFailed(e) => write!(f, "resource creation failed: {e}"),
            PoolError::CallbackFailed(e) => write!(f, "with_resource callback failed: {e}"),
        }
    }
}

impl StdError for PoolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PoolError::CreateFailed(e) | PoolError::CallbackFailed(e) => Some(e.as_ref()),
        }
    }
}

/// Returned by [`crate::Pool::take_cancellable`] when the wait was
/// cancelled before a resource became available. Per the design's error
/// policy (§7), cancellation is not a pool error — it's reported
/// separately from [`PoolError`] so callers can't confuse it with a
/// creation or callback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("acquire was cancelled before a resource became available")
    }
}

impl StdError for Cancelled {}
