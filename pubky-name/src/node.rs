//!
//! The node: identity, keystore and naming subsystem behind `publish`.
//!
//! [`Node::publish_name`] takes the raw arguments of the publish command,
//! enforces the node level preconditions and runs key resolution and record
//! publishing.
//!

use std::{
    fmt::Debug,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use pkarr::Keypair;
use tokio_util::sync::CancellationToken;

use crate::{
    content::{ContentResolver, GatewayResolver},
    data_directory::{ConfigToml, DataDir, GeneralToml},
    duration::parse_duration,
    errors::{Error, ParseError, Result},
    keys::PublicIdentity,
    keystore::{Keystore, MemoryKeystore, NodeKeystore, SELF_KEY},
    namesys::{DhtPublisher, LocalRecordStore, NamePublisher},
    path::ContentPath,
    publisher::{NameEntry, PublishOptions, RecordPublisher},
    resolver::resolve_key,
};

/// A mounted view of the name namespace that would be written to concurrently.
pub trait NameMount: Send + Sync + Debug {
    fn is_active(&self) -> bool;
}

/// Unparsed arguments of a publish, as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishArgs {
    pub path: String,
    /// Alias or identity of the signing key.
    pub key: String,
    /// Validity of the record, Go duration syntax.
    pub lifetime: String,
    /// Advisory cache duration, Go duration syntax.
    pub ttl: Option<String>,
    /// Resolve the path before publishing.
    pub resolve: bool,
    /// Publish to the local record store when the node is offline.
    pub allow_offline: bool,
}

impl PublishArgs {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: SELF_KEY.to_string(),
            lifetime: "24h".to_string(),
            ttl: None,
            resolve: true,
            allow_offline: false,
        }
    }

    /// Arguments with the defaults of the `[general]` config section.
    pub fn with_defaults(path: impl Into<String>, general: &GeneralToml) -> Self {
        Self {
            path: path.into(),
            key: general.key.clone(),
            lifetime: general.lifetime.clone(),
            ttl: general.ttl.clone(),
            resolve: general.resolve,
            allow_offline: general.allow_offline,
        }
    }
}

#[derive(Debug)]
pub struct Node {
    identity: Option<Keypair>,
    keystore: Arc<dyn Keystore>,
    content_resolver: Arc<dyn ContentResolver>,
    /// `None` when the node runs offline.
    online: Option<Arc<dyn NamePublisher>>,
    mount: Option<Arc<dyn NameMount>>,
    records_dir: PathBuf,
    offline_routing: OnceLock<Arc<LocalRecordStore>>,
}

impl Node {
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Build a node from a data directory and its config.
    ///
    /// With `offline` no pkarr client is created and nothing is sent to the DHT.
    pub fn from_data_dir(
        data_dir: &DataDir,
        config: &ConfigToml,
        offline: bool,
    ) -> anyhow::Result<Self> {
        let mut builder = Node::builder()
            .keystore(Arc::new(data_dir.keystore()))
            .content_resolver(Arc::new(GatewayResolver::new(config.content.gateway.clone())))
            .records_dir(data_dir.get_records_path());

        if let Some(identity) = data_dir.read_identity()? {
            builder = builder.identity(identity);
        }

        if !offline {
            let client = config.pkdns.pkarr_builder().build()?;
            let publisher = DhtPublisher::new(client).retry_settings(config.pkdns.retry_settings());
            builder = builder.online(Arc::new(publisher));
        }

        Ok(builder.build())
    }

    pub fn identity(&self) -> Option<PublicIdentity> {
        self.identity.as_ref().map(PublicIdentity::from_keypair)
    }

    pub fn is_online(&self) -> bool {
        self.online.is_some()
    }

    /// The keystore with the node identity exposed as `self`.
    pub fn keystore(&self) -> Arc<dyn Keystore> {
        match &self.identity {
            Some(identity) => Arc::new(NodeKeystore::new(identity.clone(), self.keystore.clone())),
            None => self.keystore.clone(),
        }
    }

    /// Route records to the local record store. Only the first call opens it.
    pub fn setup_offline_routing(&self) -> Result<Arc<LocalRecordStore>> {
        if let Some(store) = self.offline_routing.get() {
            return Ok(store.clone());
        }
        let store = LocalRecordStore::open(&self.records_dir).map_err(Error::OfflineRouting)?;
        tracing::info!("Offline routing: records go to {}", store.path().display());
        Ok(self.offline_routing.get_or_init(|| Arc::new(store)).clone())
    }

    /// Publish `args.path` under the key named by `args.key`.
    ///
    /// Checks, in this order, that the node is online (or `allow_offline` is set),
    /// that the name namespace isn't mounted and that an identity is loaded.
    /// Then the durations are parsed, the key is resolved, the path is parsed and
    /// the record is published. The first failing step ends the call.
    pub async fn publish_name(
        &self,
        args: &PublishArgs,
        cancel: &CancellationToken,
    ) -> Result<NameEntry> {
        let namesys: Arc<dyn NamePublisher> = match &self.online {
            Some(online) => online.clone(),
            None if args.allow_offline => self.setup_offline_routing()?,
            None => return Err(Error::Offline),
        };

        if self.mount.as_ref().is_some_and(|mount| mount.is_active()) {
            return Err(Error::MountConflict);
        }

        let identity = self.identity.as_ref().ok_or(Error::IdentityNotLoaded)?;

        let lifetime = parse_duration(&args.lifetime).map_err(ParseError::Lifetime)?;
        let ttl = args
            .ttl
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(ParseError::Ttl)?;

        let keystore = NodeKeystore::new(identity.clone(), self.keystore.clone());
        let keypair = resolve_key(&keystore, &args.key, cancel)?;

        let path = ContentPath::parse(&args.path)?;

        let options = PublishOptions {
            verify_exists: args.resolve,
            lifetime,
            ttl,
        };
        RecordPublisher::new(self.content_resolver.clone(), namesys)
            .publish(&keypair, &path, &options, cancel)
            .await
    }
}

/// Builder of a [`Node`].
///
/// Defaults to an offline node without identity, an in-memory keystore and the
/// public gateway.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    identity: Option<Keypair>,
    keystore: Option<Arc<dyn Keystore>>,
    content_resolver: Option<Arc<dyn ContentResolver>>,
    online: Option<Arc<dyn NamePublisher>>,
    mount: Option<Arc<dyn NameMount>>,
    records_dir: Option<PathBuf>,
}

impl NodeBuilder {
    /// Key of the node, used for the `self` alias.
    pub fn identity(mut self, identity: Keypair) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn keystore(mut self, keystore: Arc<dyn Keystore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    pub fn content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.content_resolver = Some(resolver);
        self
    }

    /// Naming subsystem used while online. Without one the node is offline.
    pub fn online(mut self, publisher: Arc<dyn NamePublisher>) -> Self {
        self.online = Some(publisher);
        self
    }

    pub fn mount(mut self, mount: Arc<dyn NameMount>) -> Self {
        self.mount = Some(mount);
        self
    }

    /// Directory of the local record store used by offline publishes.
    pub fn records_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.records_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Node {
        Node {
            identity: self.identity,
            keystore: self
                .keystore
                .unwrap_or_else(|| Arc::new(MemoryKeystore::new())),
            content_resolver: self
                .content_resolver
                .unwrap_or_else(|| Arc::new(GatewayResolver::default())),
            online: self.online,
            mount: self.mount,
            records_dir: self
                .records_dir
                .unwrap_or_else(|| DataDir::default().get_records_path()),
            offline_routing: OnceLock::new(),
        }
    }
}
