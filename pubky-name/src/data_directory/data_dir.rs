use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use pkarr::Keypair;

use super::ConfigToml;
use crate::keystore::FsKeystore;

/// The data directory of pubky-name.
///
/// Holds the config file, the node identity, the keystore and the records
/// published while offline. `~/` is expanded to the home directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDir {
    expanded_path: PathBuf,
}

impl DataDir {
    pub fn new(path: PathBuf) -> Self {
        Self {
            expanded_path: Self::expand_home_dir(path),
        }
    }

    fn expand_home_dir(path: PathBuf) -> PathBuf {
        let Some(without_home) = path.to_str().and_then(|p| p.strip_prefix("~/")) else {
            return path;
        };
        match dirs::home_dir() {
            Some(home) => home.join(without_home),
            None => path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.expanded_path
    }

    /// Create the directory if it doesn't exist.
    pub fn ensure_data_dir_exists_and_is_accessible(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.expanded_path)?;
        Ok(())
    }

    pub fn get_config_file_path(&self) -> PathBuf {
        self.expanded_path.join("config.toml")
    }

    /// Secret key file of the node identity.
    pub fn get_secret_file_path(&self) -> PathBuf {
        self.expanded_path.join("secret")
    }

    pub fn get_keystore_path(&self) -> PathBuf {
        self.expanded_path.join("keystore")
    }

    /// Where records are kept when publishing offline.
    pub fn get_records_path(&self) -> PathBuf {
        self.expanded_path.join("records")
    }

    pub fn keystore(&self) -> FsKeystore {
        FsKeystore::new(self.get_keystore_path())
    }

    /// Read the config file, overlaid on the defaults.
    /// A missing file means the defaults.
    pub fn read_config_file(&self) -> anyhow::Result<ConfigToml> {
        let config_file_path = self.get_config_file_path();
        if !config_file_path.exists() {
            return Ok(ConfigToml::default());
        }
        Ok(ConfigToml::from_file(config_file_path)?)
    }

    /// Reads the config file from the data directory.
    /// Creates a commented out sample config file if it doesn't exist.
    pub fn read_or_create_config_file(&self) -> anyhow::Result<ConfigToml> {
        let config_file_path = self.get_config_file_path();
        if !config_file_path.exists() {
            self.write_sample_config_file()?;
        }
        Ok(ConfigToml::from_file(config_file_path)?)
    }

    fn write_sample_config_file(&self) -> anyhow::Result<()> {
        let mut config_file = std::fs::File::create(self.get_config_file_path())?;
        config_file.write_all(ConfigToml::sample_string().as_bytes())?;
        Ok(())
    }

    /// The node identity, `None` if it was never created.
    pub fn read_identity(&self) -> anyhow::Result<Option<Keypair>> {
        let secret_file_path = self.get_secret_file_path();
        match Keypair::from_secret_key_file(&secret_file_path) {
            Ok(keypair) => Ok(Some(keypair)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "failed to read the node identity from {}: {e}",
                secret_file_path.display()
            )),
        }
    }

    /// Read the node identity, generating and storing a new one if there is none yet.
    pub fn read_or_create_identity(&self) -> anyhow::Result<Keypair> {
        if let Some(keypair) = self.read_identity()? {
            return Ok(keypair);
        }
        self.ensure_data_dir_exists_and_is_accessible()?;
        let keypair = Keypair::random();
        keypair.write_secret_key_file(&self.get_secret_file_path())?;
        tracing::info!("Created node identity {}", keypair.public_key());
        Ok(keypair)
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new(PathBuf::from("~/.pubky-name"))
    }
}
