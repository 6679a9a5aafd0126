//!
//! Targets a signed name record can be published to.
//!
//! - [`DhtPublisher`] broadcasts through a [`pkarr::Client`].
//! - [`LocalRecordStore`] keeps records on disk without touching the network.
//!

mod dht;
mod local;

use std::fmt::Debug;

use async_trait::async_trait;
use pkarr::{Keypair, SignedPacket};

use crate::record::NameRecord;

pub use dht::{DhtPublisher, RetrySettings};
pub use local::LocalRecordStore;

#[derive(thiserror::Error, Debug)]
pub enum NamesysError {
    /// Low-level DNS encoding failure.
    #[error("DNS operation failed: {0}")]
    Dns(#[from] pkarr::dns::SimpleDnsError),

    /// Failed to construct or sign the packet locally.
    #[error("Failed to build or sign DNS packet: {0}")]
    SignPacket(#[from] pkarr::errors::SignedPacketBuildError),

    /// DHT publish failed. Transient unless another packet won the compare-and-swap.
    #[error("Failed to publish record to the DHT: {0}")]
    Publish(#[from] pkarr::errors::PublishError),

    /// Reading or writing the local record store failed.
    #[error("Local record store failed: {0}")]
    Storage(#[from] std::io::Error),

    /// A stored or resolved packet doesn't hold a valid name record.
    #[error("Name record is malformed or missing required data: {0}")]
    InvalidRecord(String),
}

impl NamesysError {
    /// Returns true if the error is from a DHT operation that might succeed by simply retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NamesysError::Publish(e) if dht::is_transient(e))
    }
}

/// Publishes name records.
///
/// Implementations sign `record` with `keypair` and return the packet that was
/// stored.
///
/// Dropping the returned future stops waiting for the result, not the publish
/// itself: a packet already handed to the DHT may still land after a cancel.
#[async_trait]
pub trait NamePublisher: Send + Sync + Debug {
    async fn publish(
        &self,
        keypair: &Keypair,
        record: &NameRecord,
    ) -> Result<SignedPacket, NamesysError>;
}
