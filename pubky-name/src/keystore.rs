//!
//! Local storage of signing keys, addressed by alias.
//!

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use pkarr::Keypair;

/// Reserved alias of the node's own identity key.
pub const SELF_KEY: &str = "self";

#[derive(thiserror::Error, Debug)]
pub enum KeystoreError {
    #[error("no key named {0:?} in the keystore")]
    NoSuchKey(String),
    #[error("a key named {0:?} already exists")]
    KeyExists(String),
    #[error("invalid key name {alias:?}: {reason}")]
    InvalidAlias { alias: String, reason: &'static str },
    #[error("stored key {alias:?} is malformed: {source}")]
    MalformedKey { alias: String, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl KeystoreError {
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, KeystoreError::NoSuchKey(_))
    }
}

/// A store of private keys.
///
/// Implementations synchronize themselves; callers share them behind an `Arc`.
pub trait Keystore: Send + Sync + Debug {
    /// Fetch a key by alias. Must fail with [`KeystoreError::NoSuchKey`]
    /// when the alias is valid but absent.
    fn get(&self, alias: &str) -> Result<Keypair, KeystoreError>;

    /// All stored aliases, in a stable order.
    fn list(&self) -> Result<Vec<String>, KeystoreError>;

    /// Store a new key. Fails with [`KeystoreError::KeyExists`] instead of overwriting.
    fn put(&self, alias: &str, keypair: &Keypair) -> Result<(), KeystoreError>;

    fn has(&self, alias: &str) -> Result<bool, KeystoreError> {
        match self.get(alias) {
            Ok(_) => Ok(true),
            Err(KeystoreError::NoSuchKey(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn validate_alias(alias: &str) -> Result<(), KeystoreError> {
    let reason = if alias.is_empty() {
        "key names must not be empty"
    } else if alias.starts_with('.') {
        "key names may not begin with a period"
    } else if alias.contains(['/', '\\']) {
        "key names may not contain path separators"
    } else {
        return Ok(());
    };
    Err(KeystoreError::InvalidAlias {
        alias: alias.to_string(),
        reason,
    })
}

fn validate_new_alias(alias: &str) -> Result<(), KeystoreError> {
    validate_alias(alias)?;
    if alias == SELF_KEY {
        return Err(KeystoreError::InvalidAlias {
            alias: alias.to_string(),
            reason: "this name is reserved for the node identity",
        });
    }
    Ok(())
}

/// Keystore backed by a directory with one pkarr secret key file per alias.
#[derive(Debug, Clone)]
pub struct FsKeystore {
    dir: PathBuf,
}

impl FsKeystore {
    /// Use `dir` as keystore. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(alias)
    }
}

impl Keystore for FsKeystore {
    fn get(&self, alias: &str) -> Result<Keypair, KeystoreError> {
        validate_alias(alias)?;
        let path = self.key_path(alias);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(KeystoreError::NoSuchKey(alias.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeystoreError::NoSuchKey(alias.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        Keypair::from_secret_key_file(&path).map_err(|source| KeystoreError::MalformedKey {
            alias: alias.to_string(),
            source,
        })
    }

    fn list(&self) -> Result<Vec<String>, KeystoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut aliases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::debug!("Skipping non utf-8 keystore entry {:?}", entry.path());
                continue;
            };
            if validate_alias(&name).is_ok() {
                aliases.push(name);
            }
        }
        aliases.sort();
        Ok(aliases)
    }

    fn put(&self, alias: &str, keypair: &Keypair) -> Result<(), KeystoreError> {
        validate_new_alias(alias)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(alias);
        if path.exists() {
            return Err(KeystoreError::KeyExists(alias.to_string()));
        }
        keypair.write_secret_key_file(&path)?;
        Ok(())
    }
}

/// In-memory keystore. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    keys: RwLock<BTreeMap<String, Keypair>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for MemoryKeystore {
    fn get(&self, alias: &str) -> Result<Keypair, KeystoreError> {
        validate_alias(alias)?;
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(alias)
            .cloned()
            .ok_or_else(|| KeystoreError::NoSuchKey(alias.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, KeystoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.keys().cloned().collect())
    }

    fn put(&self, alias: &str, keypair: &Keypair) -> Result<(), KeystoreError> {
        validate_new_alias(alias)?;
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.contains_key(alias) {
            return Err(KeystoreError::KeyExists(alias.to_string()));
        }
        keys.insert(alias.to_string(), keypair.clone());
        Ok(())
    }
}

/// Exposes the node identity under [`SELF_KEY`] on top of another keystore.
#[derive(Debug, Clone)]
pub struct NodeKeystore {
    identity: Keypair,
    inner: Arc<dyn Keystore>,
}

impl NodeKeystore {
    pub fn new(identity: Keypair, inner: Arc<dyn Keystore>) -> Self {
        Self { identity, inner }
    }
}

impl Keystore for NodeKeystore {
    fn get(&self, alias: &str) -> Result<Keypair, KeystoreError> {
        if alias == SELF_KEY {
            return Ok(self.identity.clone());
        }
        self.inner.get(alias)
    }

    fn list(&self) -> Result<Vec<String>, KeystoreError> {
        let mut aliases = vec![SELF_KEY.to_string()];
        aliases.extend(self.inner.list()?);
        Ok(aliases)
    }

    fn put(&self, alias: &str, keypair: &Keypair) -> Result<(), KeystoreError> {
        self.inner.put(alias, keypair)
    }
}
