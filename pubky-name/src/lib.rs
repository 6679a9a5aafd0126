#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod content;
pub mod data_directory;
mod duration;
pub mod errors;
mod keys;
pub mod keystore;
pub mod namesys;
mod node;
mod path;
mod publisher;
mod record;
mod resolver;
pub mod tracing;

// --- PUBLIC API EXPORTS ---
pub use content::{ContentResolver, GatewayResolver};
pub use data_directory::{ConfigToml, DataDir};
pub use duration::{parse_duration, DurationError};
pub use errors::{Error, ParseError, Result};
pub use keys::{PublicIdentity, IDENTITY_PREFIX};
pub use keystore::{FsKeystore, Keystore, KeystoreError, MemoryKeystore, NodeKeystore, SELF_KEY};
pub use namesys::{DhtPublisher, LocalRecordStore, NamePublisher, NamesysError, RetrySettings};
pub use node::{NameMount, Node, NodeBuilder, PublishArgs};
pub use path::{ContentPath, PathError};
pub use publisher::{NameEntry, PublishOptions, RecordPublisher, DEFAULT_LIFETIME};
pub use record::{NameRecord, DEFAULT_RECORD_TTL, DNSLINK_NAME};
pub use resolver::resolve_key;

// Re-exports
pub use pkarr::{Keypair, PublicKey};
