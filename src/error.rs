use std::backtrace::Backtrace;
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that abort a run. Branch inconsistency is *not* an error: store
/// mutators report it as `Ok(None)` and the search driver silently discards
/// the branch.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// Malformed input to a constraint constructor or goal: mismatched slice
    /// lengths, empty variable lists, non-positive durations, and the like.
    #[error("usage: {0}")]
    Usage(String),
    /// A resource bound was exceeded: a domain value beyond the store's
    /// MaxValue, or a branch deeper than the configured recursion guard.
    #[error("capacity: {0}")]
    Capacity(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Inner: {inner}\n{backtrace}")]
    Inner {
        inner: Box<SolverError>,
        backtrace: Box<Backtrace>,
    },
}

impl From<SolverError> for Error {
    fn from(inner: SolverError) -> Self {
        Error::Inner {
            inner: Box::new(inner),
            backtrace: Box::new(std::backtrace::Backtrace::capture()),
        }
    }
}

impl Error {
    pub fn is_usage(&self) -> bool {
        let Error::Inner { inner, .. } = self;
        matches!(**inner, SolverError::Usage(_))
    }

    pub fn is_capacity(&self) -> bool {
        let Error::Inner { inner, .. } = self;
        matches!(**inner, SolverError::Capacity(_))
    }
}

pub(crate) fn usage(msg: impl Into<String>) -> Error {
    SolverError::Usage(msg.into()).into()
}

pub(crate) fn capacity(msg: impl Into<String>) -> Error {
    SolverError::Capacity(msg.into()).into()
}
