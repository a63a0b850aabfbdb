//! Error types for the state cell.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error accepted from user-supplied commands and source streams.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure raised by an update command.
///
/// Recorded in-band on the resulting [`Transition`](crate::Transition)
/// rather than surfaced to the caller. Cheap to clone so the transition
/// can be fanned out to any number of subscribers.
#[derive(Clone)]
pub struct CommandError(Arc<dyn StdError + Send + Sync>);

impl CommandError {
    pub(crate) fn new(err: BoxError) -> Self {
        CommandError(Arc::from(err))
    }

    /// The underlying error raised by the command.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandError({})", self.0)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for CommandError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Terminal failure propagated from a seeding source stream.
///
/// Once a source faults, the store's broadcast channel terminates: the
/// fault is delivered to every subscriber (after any buffered events)
/// and no further transitions are possible.
#[derive(Clone)]
pub struct SourceError(Arc<dyn StdError + Send + Sync>);

impl SourceError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        SourceError(Arc::from(err.into()))
    }

    /// The underlying source failure.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceError({})", self.0)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for SourceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Main error type for subscriber-side operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source stream failed: {0}")]
    Source(SourceError),

    #[error("subscription disconnected")]
    Disconnected,

    #[error("no event ready")]
    Empty,

    #[error("timed out waiting for an event")]
    Timeout,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
