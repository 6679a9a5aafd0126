//! Unified error types for the `pubky-name` crate.
//!
//! Every failure of a publish maps onto one variant of [`Error`], so callers
//! can tell, for example, a rejected input from a publish that already went out.

use thiserror::Error;

use crate::{
    content::ResolveError, duration::DurationError, keystore::KeystoreError,
    namesys::NamesysError, path::PathError,
};

/// Malformed user input, detected before any keystore or network access.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("error parsing lifetime option: {0}")]
    Lifetime(DurationError),

    #[error("error parsing ttl option: {0}")]
    Ttl(DurationError),

    #[error("invalid content path: {0}")]
    Path(#[from] PathError),

    #[error("key reference must not be empty")]
    EmptyKeyReference,
}

/// The crate’s top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The node has no network and offline publishing wasn't allowed.
    #[error("can't publish while offline: pass `--allow-offline` to override")]
    Offline,

    /// Setting up the local-only record store failed.
    #[error("failed to set up offline routing: {0}")]
    OfflineRouting(std::io::Error),

    /// The name namespace is mounted and could be written to concurrently.
    #[error("cannot manually publish while the name namespace is mounted")]
    MountConflict,

    /// No node identity is configured.
    #[error("identity not loaded")]
    IdentityNotLoaded,

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Neither an alias nor a derived identity matched the key reference.
    #[error("no key by the given name or identity was found: {0:?}")]
    KeyNotFound(String),

    /// The keystore failed for a reason other than a missing alias.
    #[error("Keystore operation failed: {0}")]
    Keystore(#[from] KeystoreError),

    /// The path to publish could not be resolved. Nothing was published.
    #[error("failed to resolve {path} before publishing: {source}")]
    Resolution {
        path: String,
        #[source]
        source: ResolveError,
    },

    /// The naming subsystem failed to store the record.
    #[error("Failed to publish name record: {0}")]
    Publish(#[from] NamesysError),

    /// The record **was published**, but under a name that doesn't match the
    /// identity derived from the signing key.
    #[error("record was published under {published} but the signing key derives {derived}")]
    KeyDerivation { published: String, derived: String },

    /// The caller cancelled the operation before it completed.
    #[error("publish was cancelled")]
    Cancelled,
}

impl Error {
    /// True when a record reached the naming subsystem despite the error.
    pub fn record_was_published(&self) -> bool {
        matches!(self, Error::KeyDerivation { .. })
    }

    /// True when repeating the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Publish(e) => e.is_retryable(),
            Error::Resolution { source, .. } => matches!(source, ResolveError::Transport(_)),
            _ => false,
        }
    }
}

/// A specialized `Result` type for `pubky-name` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<PathError> for Error {
    fn from(err: PathError) -> Self {
        Error::Parse(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_key_derivation_reports_a_published_record() {
        let err = Error::KeyDerivation {
            published: "a".into(),
            derived: "b".into(),
        };
        assert!(err.record_was_published());
        assert!(!Error::Cancelled.record_was_published());
        assert!(!Error::KeyNotFound("mykey".into()).record_was_published());
    }

    #[test]
    fn not_found_message() {
        let err = Error::KeyNotFound("mykey".into());
        assert_eq!(
            err.to_string(),
            "no key by the given name or identity was found: \"mykey\""
        );
    }

    #[test]
    fn path_errors_are_parse_errors() {
        let err: Error = PathError::Empty.into();
        assert!(matches!(err, Error::Parse(ParseError::Path(PathError::Empty))));
    }
}
