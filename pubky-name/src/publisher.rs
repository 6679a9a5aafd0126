//!
//! Publishes a name record for a resolved signing key.
//!

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use pkarr::Keypair;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    content::ContentResolver,
    duration::DurationError,
    errors::{Error, ParseError, Result},
    keys::PublicIdentity,
    namesys::NamePublisher,
    path::ContentPath,
    record::NameRecord,
};

/// How long a record stays valid when no lifetime is given.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Resolve the path before publishing and refuse to publish dangling names.
    pub verify_exists: bool,
    /// Validity of the record, counted from the moment of publishing.
    pub lifetime: Duration,
    /// Advisory cache duration embedded in the record.
    pub ttl: Option<Duration>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            verify_exists: true,
            lifetime: DEFAULT_LIFETIME,
            ttl: None,
        }
    }
}

/// A published name and the value it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    pub value: String,
}

/// Absolute expiration of a record published now with the given lifetime.
pub fn expiration_from(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(lifetime)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            ParseError::Lifetime(DurationError::OutOfRange(format!("{lifetime:?}"))).into()
        })
}

/// Verifies, signs and hands name records to a [`NamePublisher`].
#[derive(Debug, Clone)]
pub struct RecordPublisher {
    content_resolver: Arc<dyn ContentResolver>,
    namesys: Arc<dyn NamePublisher>,
}

impl RecordPublisher {
    pub fn new(content_resolver: Arc<dyn ContentResolver>, namesys: Arc<dyn NamePublisher>) -> Self {
        Self {
            content_resolver,
            namesys,
        }
    }

    /// Publish `path` under the identity of `keypair`.
    ///
    /// Cancelling `cancel` before the naming subsystem reports success returns
    /// [`Error::Cancelled`]. A packet already handed to the DHT may still land.
    pub async fn publish(
        &self,
        keypair: &Keypair,
        path: &ContentPath,
        options: &PublishOptions,
        cancel: &CancellationToken,
    ) -> Result<NameEntry> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if options.verify_exists {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                resolved = self.content_resolver.resolve(path) => {
                    resolved.map_err(|source| Error::Resolution {
                        path: path.to_string(),
                        source,
                    })?;
                }
            }
        }

        let eol = expiration_from(Utc::now(), options.lifetime)?;
        let record = NameRecord::new(path.clone(), eol).with_ttl(options.ttl);

        let packet = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            published = self.namesys.publish(keypair, &record) => published?,
        };

        let derived = PublicIdentity::from_keypair(keypair);
        let published = PublicIdentity::from_public_key(&packet.public_key());
        if derived != published {
            return Err(Error::KeyDerivation {
                published: published.to_string(),
                derived: derived.to_string(),
            });
        }

        tracing::info!("Published {derived}: {path} (valid until {eol})");

        Ok(NameEntry {
            name: derived.to_string(),
            value: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use pkarr::SignedPacket;

    use super::*;
    use crate::{content::ResolveError, namesys::NamesysError};

    #[derive(Debug, Default)]
    struct RecordingPublisher {
        calls: AtomicUsize,
        last: Mutex<Option<NameRecord>>,
    }

    #[async_trait]
    impl NamePublisher for RecordingPublisher {
        async fn publish(
            &self,
            keypair: &Keypair,
            record: &NameRecord,
        ) -> std::result::Result<SignedPacket, NamesysError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(record.clone());
            record.sign(keypair, None)
        }
    }

    /// Signs with its own key, whatever it's asked to.
    #[derive(Debug)]
    struct ImpostorPublisher(Keypair);

    #[async_trait]
    impl NamePublisher for ImpostorPublisher {
        async fn publish(
            &self,
            _keypair: &Keypair,
            record: &NameRecord,
        ) -> std::result::Result<SignedPacket, NamesysError> {
            record.sign(&self.0, None)
        }
    }

    #[derive(Debug)]
    struct PendingPublisher;

    #[async_trait]
    impl NamePublisher for PendingPublisher {
        async fn publish(
            &self,
            _keypair: &Keypair,
            _record: &NameRecord,
        ) -> std::result::Result<SignedPacket, NamesysError> {
            std::future::pending().await
        }
    }

    #[derive(Debug)]
    struct StaticResolver(bool);

    #[async_trait]
    impl ContentResolver for StaticResolver {
        async fn resolve(&self, path: &ContentPath) -> std::result::Result<(), ResolveError> {
            if self.0 {
                return Ok(());
            }
            Err(ResolveError::Unavailable {
                status: reqwest::StatusCode::NOT_FOUND,
                url: url::Url::parse("https://gateway.example")
                    .unwrap()
                    .join(path.as_str())
                    .unwrap(),
            })
        }
    }

    fn path() -> ContentPath {
        ContentPath::parse("/content/abc").unwrap()
    }

    #[tokio::test]
    async fn result_names_the_signing_key() {
        let namesys = Arc::new(RecordingPublisher::default());
        let publisher = RecordPublisher::new(Arc::new(StaticResolver(false)), namesys.clone());
        let keypair = Keypair::random();
        let options = PublishOptions {
            verify_exists: false,
            ..Default::default()
        };

        let entry = publisher
            .publish(&keypair, &path(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(entry.name, PublicIdentity::from_keypair(&keypair).to_string());
        assert_eq!(entry.value, "/content/abc");
        assert_eq!(namesys.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiration_is_absolute_and_ttl_is_passed_along() {
        let namesys = Arc::new(RecordingPublisher::default());
        let publisher = RecordPublisher::new(Arc::new(StaticResolver(true)), namesys.clone());
        let options = PublishOptions {
            verify_exists: true,
            lifetime: Duration::from_secs(3600),
            ttl: Some(Duration::from_secs(30)),
        };

        let before = Utc::now();
        publisher
            .publish(&Keypair::random(), &path(), &options, &CancellationToken::new())
            .await
            .unwrap();
        let after = Utc::now();

        let record = namesys.last.lock().unwrap().clone().unwrap();
        assert!(record.eol >= before + TimeDelta::hours(1));
        assert!(record.eol <= after + TimeDelta::hours(1));
        assert_eq!(record.ttl, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn unresolvable_path_is_never_published() {
        let namesys = Arc::new(RecordingPublisher::default());
        let publisher = RecordPublisher::new(Arc::new(StaticResolver(false)), namesys.clone());

        let err = publisher
            .publish(
                &Keypair::random(),
                &path(),
                &PublishOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolution { .. }));
        assert!(!err.record_was_published());
        assert_eq!(namesys.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mismatching_published_key_is_a_derivation_error() {
        let publisher = RecordPublisher::new(
            Arc::new(StaticResolver(true)),
            Arc::new(ImpostorPublisher(Keypair::random())),
        );

        let err = publisher
            .publish(
                &Keypair::random(),
                &path(),
                &PublishOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::KeyDerivation { .. }));
        assert!(err.record_was_published());
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_publish() {
        let publisher =
            RecordPublisher::new(Arc::new(StaticResolver(true)), Arc::new(PendingPublisher));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = publisher
            .publish(&Keypair::random(), &path(), &PublishOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn already_cancelled_publishes_nothing() {
        let namesys = Arc::new(RecordingPublisher::default());
        let publisher = RecordPublisher::new(Arc::new(StaticResolver(true)), namesys.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = publisher
            .publish(&Keypair::random(), &path(), &PublishOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(namesys.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lifetime_overflow_is_rejected() {
        let err = expiration_from(Utc::now(), Duration::from_secs(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Lifetime(_))));
    }
}
