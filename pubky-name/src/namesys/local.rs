//!
//! Offline routing: keeps signed name records on disk instead of broadcasting them.
//!

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use pkarr::{Keypair, PublicKey, SignedPacket};

use super::{NamePublisher, NamesysError};
use crate::record::NameRecord;

/// Last-seen timestamp, public key, signature and packet timestamp.
const MIN_STORED_LEN: usize = 8 + 32 + 64 + 8;

/// Directory of serialized signed packets, one file per public key.
#[derive(Debug, Clone)]
pub struct LocalRecordStore {
    dir: PathBuf,
}

impl LocalRecordStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, public_key: &PublicKey) -> PathBuf {
        self.dir.join(public_key.to_string())
    }

    /// The stored packet of `public_key`, if any.
    pub async fn get(&self, public_key: &PublicKey) -> Result<Option<SignedPacket>, NamesysError> {
        let bytes = match tokio::fs::read(self.record_path(public_key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < MIN_STORED_LEN {
            return Err(NamesysError::InvalidRecord(format!(
                "stored packet of {public_key} is truncated ({} bytes)",
                bytes.len()
            )));
        }
        let packet = SignedPacket::deserialize(&bytes).map_err(|e| {
            NamesysError::InvalidRecord(format!("stored packet of {public_key} is corrupt: {e}"))
        })?;
        if &packet.public_key() != public_key {
            return Err(NamesysError::InvalidRecord(format!(
                "stored packet of {public_key} is signed by {}",
                packet.public_key()
            )));
        }
        Ok(Some(packet))
    }
}

#[async_trait]
impl NamePublisher for LocalRecordStore {
    async fn publish(
        &self,
        keypair: &Keypair,
        record: &NameRecord,
    ) -> Result<SignedPacket, NamesysError> {
        let public_key = keypair.public_key();
        let existing = self.get(&public_key).await?;
        let packet = record.sign(keypair, existing.as_ref())?;

        // Write next to the target and rename so readers never see a partial packet.
        let target = self.record_path(&public_key);
        let tmp = self.dir.join(format!(".{public_key}.tmp"));
        tokio::fs::write(&tmp, packet.serialize()).await?;
        tokio::fs::rename(&tmp, &target).await?;

        tracing::info!("Saved the name record of {public_key} to the local record store.");
        Ok(packet)
    }
}
