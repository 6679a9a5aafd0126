//!
//! Name record encoding.
//!
//! A name record lives in the signer's pkarr packet as two TXT records at `_dnslink`:
//! `dnslink=<path>` and `eol=<RFC 3339 expiration>`. Other records of the packet
//! are left untouched when a name is republished.
//!

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use pkarr::{
    dns::rdata::{RData, TXT},
    Keypair, SignedPacket,
};

use crate::{namesys::NamesysError, path::ContentPath};

/// DNS name the record is stored under.
pub const DNSLINK_NAME: &str = "_dnslink";

/// DNS TTL used when no cache hint is given.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(60);

const VALUE_PREFIX: &str = "dnslink=";
const EOL_PREFIX: &str = "eol=";

/// What gets published: a content path, its absolute expiration and an
/// optional cache hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub value: ContentPath,
    /// End of life. Consumers treat the record as invalid afterwards.
    pub eol: DateTime<Utc>,
    /// How long caches may consider the record fresh. Independent of `eol`.
    pub ttl: Option<Duration>,
}

impl NameRecord {
    pub fn new(value: ContentPath, eol: DateTime<Utc>) -> Self {
        Self {
            value,
            eol,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// DNS TTL in seconds, saturating.
    pub fn dns_ttl(&self) -> u32 {
        let ttl = self.ttl.unwrap_or(DEFAULT_RECORD_TTL);
        u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.eol <= now
    }

    /// Sign the record into a packet, keeping every record of `existing`
    /// that isn't part of a name record.
    pub fn sign(
        &self,
        keypair: &Keypair,
        existing: Option<&SignedPacket>,
    ) -> Result<SignedPacket, NamesysError> {
        let mut builder = SignedPacket::builder();
        if let Some(packet) = existing {
            let own_name = format!("{DNSLINK_NAME}.{}", packet.public_key());
            for record in packet.all_resource_records() {
                let name = record.name.to_string();
                if !name.trim_end_matches('.').eq_ignore_ascii_case(&own_name) {
                    builder = builder.record(record.to_owned());
                }
            }
        }

        let ttl = self.dns_ttl();

        let value_txt = format!("{VALUE_PREFIX}{}", self.value);
        let mut value = TXT::new();
        value.add_string(&value_txt)?;

        let eol_txt = format!(
            "{EOL_PREFIX}{}",
            self.eol.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        let mut eol = TXT::new();
        eol.add_string(&eol_txt)?;

        let packet = builder
            .txt(DNSLINK_NAME.try_into()?, value, ttl)
            .txt(DNSLINK_NAME.try_into()?, eol, ttl)
            .sign(keypair)?;
        Ok(packet)
    }

    /// Read a name record back from a signed packet.
    pub fn from_packet(packet: &SignedPacket) -> Result<Self, NamesysError> {
        let mut value = None;
        let mut eol = None;
        let mut ttl = None;

        for record in packet.resource_records(DNSLINK_NAME) {
            let RData::TXT(txt) = &record.rdata else {
                continue;
            };
            let Ok(text) = String::try_from(txt.clone()) else {
                continue;
            };
            if let Some(raw) = text.strip_prefix(VALUE_PREFIX) {
                value = Some(
                    ContentPath::parse(raw)
                        .map_err(|e| NamesysError::InvalidRecord(e.to_string()))?,
                );
                ttl = Some(Duration::from_secs(record.ttl.into()));
            } else if let Some(raw) = text.strip_prefix(EOL_PREFIX) {
                let parsed = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| NamesysError::InvalidRecord(format!("invalid eol {raw:?}: {e}")))?;
                eol = Some(parsed.with_timezone(&Utc));
            }
        }

        let value = value.ok_or_else(|| {
            NamesysError::InvalidRecord(format!("no {VALUE_PREFIX} record at {DNSLINK_NAME}"))
        })?;
        let eol = eol.ok_or_else(|| {
            NamesysError::InvalidRecord(format!("no {EOL_PREFIX} record at {DNSLINK_NAME}"))
        })?;

        Ok(Self { value, eol, ttl })
    }
}
