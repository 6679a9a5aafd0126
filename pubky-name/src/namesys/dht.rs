//!
//! Publishes name records to the mainline DHT with retries in case it fails.
//!

use std::{num::NonZeroU8, time::Duration};

use async_trait::async_trait;
use pkarr::{errors::PublishError, Keypair, SignedPacket};

use super::{NamePublisher, NamesysError};
use crate::record::NameRecord;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Number of attempts before giving up.
    pub(crate) max_attempts: NonZeroU8,
    /// First retry delay that is then used to calculate the exponential backoff.
    /// Example: 200ms first, then 400ms, 800ms and so on.
    pub(crate) initial_retry_delay: Duration,
    /// Cap on the retry delay so the exponential backoff doesn't get out of hand.
    pub(crate) max_retry_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU8::MIN.saturating_add(2),
            initial_retry_delay: Duration::from_millis(200),
            max_retry_delay: Duration::from_millis(5_000),
        }
    }
}

impl RetrySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of publish attempts, the first one included.
    pub fn max_attempts(&mut self, max_attempts: NonZeroU8) -> &mut Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Maximum duration to back off before trying again.
    pub fn max_retry_delay(&mut self, duration: Duration) -> &mut Self {
        self.max_retry_delay = duration;
        self
    }

    /// Delay before the first retry.
    pub fn initial_retry_delay(&mut self, duration: Duration) -> &mut Self {
        self.initial_retry_delay = duration;
        self
    }

    /// Exponential backoff starting with `initial_retry_delay` and capped at `max_retry_delay`.
    fn retry_delay(&self, retry_count: u8) -> Duration {
        let multiplicator = 2u32.saturating_pow(retry_count.into());
        self.initial_retry_delay
            .saturating_mul(multiplicator)
            .min(self.max_retry_delay)
    }
}

/// Signs name records and publishes them through a pkarr client.
///
/// The most recent packet of the key is resolved first so unrelated records survive
/// and the publish is a compare-and-swap on its timestamp.
#[derive(Debug, Clone)]
pub struct DhtPublisher {
    client: pkarr::Client,
    retry_settings: RetrySettings,
}

impl DhtPublisher {
    pub fn new(client: pkarr::Client) -> Self {
        Self {
            client,
            retry_settings: RetrySettings::default(),
        }
    }

    pub fn retry_settings(mut self, settings: RetrySettings) -> Self {
        self.retry_settings = settings;
        self
    }

    pub fn client(&self) -> &pkarr::Client {
        &self.client
    }
}

#[async_trait]
impl NamePublisher for DhtPublisher {
    async fn publish(
        &self,
        keypair: &Keypair,
        record: &NameRecord,
    ) -> Result<SignedPacket, NamesysError> {
        let public_key = keypair.public_key();
        let existing = self.client.resolve_most_recent(&public_key).await;
        let packet = record.sign(keypair, existing.as_ref())?;
        let cas = existing.map(|p| p.timestamp());

        let max_attempts = self.retry_settings.max_attempts.get();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.publish(&packet, cas).await {
                Ok(()) => {
                    tracing::debug!("Published {public_key} after {attempt} attempt(s).");
                    return Ok(packet);
                }
                Err(e) if attempt < max_attempts && is_transient(&e) => {
                    let delay = self.retry_settings.retry_delay(attempt - 1);
                    tracing::warn!(
                        "{attempt}/{max_attempts} Failed to publish {public_key}: {e}. Retry in {delay:?}."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!("{attempt}/{max_attempts} Failed to publish {public_key}: {e}");
                    return Err(e.into());
                }
            }
        }
    }
}

/// A lost compare-and-swap won't succeed by sending the same packet again.
pub(super) fn is_transient(error: &PublishError) -> bool {
    !matches!(error, PublishError::Concurrency(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ContentPath;
    use chrono::{TimeDelta, Utc};

    #[test]
    fn retry_delay() {
        let mut settings = RetrySettings::new();
        settings
            .max_attempts(NonZeroU8::new(10).unwrap())
            .initial_retry_delay(Duration::from_millis(100))
            .max_retry_delay(Duration::from_secs(10));

        assert_eq!(settings.retry_delay(0).as_millis(), 100);
        assert_eq!(settings.retry_delay(1).as_millis(), 200);
        assert_eq!(settings.retry_delay(2).as_millis(), 400);
        assert_eq!(settings.retry_delay(9).as_millis(), 10_000);
        assert_eq!(settings.retry_delay(u8::MAX).as_millis(), 10_000);
    }

    #[test]
    fn concurrency_errors_are_not_retried() {
        use pkarr::errors::{ConcurrencyError, QueryError};

        assert!(is_transient(&PublishError::Query(QueryError::Timeout)));
        assert!(!is_transient(&PublishError::Concurrency(
            ConcurrencyError::CasFailed
        )));

        let conflict = PublishError::Concurrency(ConcurrencyError::ConflictRisk);
        assert!(!NamesysError::from(conflict).is_retryable());
        assert!(NamesysError::from(PublishError::Query(QueryError::Timeout)).is_retryable());
    }

    #[test]
    fn default_attempts() {
        assert_eq!(RetrySettings::default().max_attempts.get(), 3);
    }

    #[tokio::test]
    async fn publish_to_local_dht() {
        let dht = tokio::task::spawn_blocking(|| mainline::Testnet::new(3))
            .await
            .expect("spawn_blocking panicked")
            .unwrap();
        let mut builder = pkarr::Client::builder();
        builder
            .no_default_network()
            .bootstrap(&dht.bootstrap)
            .no_relays();
        let client = builder.build().unwrap();
        let publisher = DhtPublisher::new(client.clone());

        let keypair = Keypair::random();
        let eol = Utc::now() + TimeDelta::hours(24);
        let record = NameRecord::new(ContentPath::parse("/content/abc").unwrap(), eol);

        let packet = publisher.publish(&keypair, &record).await.unwrap();
        assert_eq!(packet.public_key(), keypair.public_key());

        let resolved = client
            .resolve_most_recent(&keypair.public_key())
            .await
            .expect("record to be resolvable");
        assert_eq!(NameRecord::from_packet(&resolved).unwrap().value, record.value);
    }
}
