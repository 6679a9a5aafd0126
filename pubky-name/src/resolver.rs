//!
//! Turns a key reference into the signing key it names.
//!
//! A reference is either a keystore alias (`self` included) or the identity
//! of a stored key, as printed by `key list -l`.
//!

use pkarr::Keypair;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{Error, ParseError, Result},
    keys::PublicIdentity,
    keystore::{Keystore, KeystoreError},
};

/// Look `reference` up as an alias first, then as the identity of any stored key.
///
/// Only a missing alias falls through to the scan. Every other keystore error,
/// including one raised while loading a key during the scan, aborts the lookup.
pub fn resolve_key(
    keystore: &dyn Keystore,
    reference: &str,
    cancel: &CancellationToken,
) -> Result<Keypair> {
    if reference.is_empty() {
        return Err(ParseError::EmptyKeyReference.into());
    }

    match keystore.get(reference) {
        Ok(keypair) => return Ok(keypair),
        Err(KeystoreError::NoSuchKey(_)) => {}
        Err(e) => return Err(e.into()),
    }

    tracing::debug!("No key named {reference:?}, scanning stored keys for a matching identity.");

    for alias in keystore.list()? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let keypair = keystore.get(&alias)?;
        if PublicIdentity::from_keypair(&keypair).matches(reference) {
            tracing::debug!("Key reference {reference:?} resolved to key {alias:?}.");
            return Ok(keypair);
        }
    }

    Err(Error::KeyNotFound(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use super::*;
    use crate::keystore::{MemoryKeystore, NodeKeystore, SELF_KEY};

    /// Fails on a chosen operation, delegates everything else.
    #[derive(Debug)]
    struct FaultyKeystore {
        inner: MemoryKeystore,
        broken_alias: Option<&'static str>,
        fail_lookups: bool,
    }

    impl Keystore for FaultyKeystore {
        fn get(&self, alias: &str) -> std::result::Result<Keypair, KeystoreError> {
            if self.fail_lookups {
                return Err(io::Error::other("disk on fire").into());
            }
            if Some(alias) == self.broken_alias {
                return Err(KeystoreError::MalformedKey {
                    alias: alias.to_string(),
                    source: io::Error::new(io::ErrorKind::InvalidData, "bad hex"),
                });
            }
            self.inner.get(alias)
        }

        fn list(&self) -> std::result::Result<Vec<String>, KeystoreError> {
            self.inner.list()
        }

        fn put(&self, alias: &str, keypair: &Keypair) -> std::result::Result<(), KeystoreError> {
            self.inner.put(alias, keypair)
        }
    }

    fn keystore_with(aliases: &[&str]) -> (MemoryKeystore, Vec<Keypair>) {
        let keystore = MemoryKeystore::new();
        let keys = aliases
            .iter()
            .map(|alias| {
                let keypair = Keypair::random();
                keystore.put(alias, &keypair).unwrap();
                keypair
            })
            .collect();
        (keystore, keys)
    }

    #[test]
    fn alias_and_identity_resolve_to_the_same_key() {
        let (keystore, keys) = keystore_with(&["alpha", "beta", "gamma"]);
        let cancel = CancellationToken::new();

        for (alias, keypair) in ["alpha", "beta", "gamma"].iter().zip(&keys) {
            let identity = PublicIdentity::from_keypair(keypair);
            let by_alias = resolve_key(&keystore, alias, &cancel).unwrap();
            let by_identity = resolve_key(&keystore, &identity.to_string(), &cancel).unwrap();
            let by_z32 = resolve_key(&keystore, &identity.z32(), &cancel).unwrap();
            assert_eq!(by_alias.public_key(), keypair.public_key());
            assert_eq!(by_identity.public_key(), keypair.public_key());
            assert_eq!(by_z32.public_key(), keypair.public_key());
        }
    }

    #[test]
    fn self_resolves_to_node_identity() {
        let identity = Keypair::random();
        let (inner, _) = keystore_with(&["mykey"]);
        let keystore = NodeKeystore::new(identity.clone(), Arc::new(inner));
        let cancel = CancellationToken::new();

        let by_alias = resolve_key(&keystore, SELF_KEY, &cancel).unwrap();
        assert_eq!(by_alias.public_key(), identity.public_key());

        let reference = PublicIdentity::from_keypair(&identity).to_string();
        let by_identity = resolve_key(&keystore, &reference, &cancel).unwrap();
        assert_eq!(by_identity.public_key(), identity.public_key());
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let (keystore, _) = keystore_with(&["alpha"]);
        let err = resolve_key(&keystore, "mykey", &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(ref r) if r == "mykey"));
        assert!(err.to_string().contains("no key by the given name or identity was found"));

        let stranger = PublicIdentity::from_keypair(&Keypair::random()).to_string();
        let err = resolve_key(&keystore, &stranger, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(_)));
    }

    #[test]
    fn empty_reference_is_rejected() {
        let (keystore, _) = keystore_with(&[]);
        let err = resolve_key(&keystore, "", &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::EmptyKeyReference)));
    }

    #[test]
    fn storage_errors_are_not_masked_by_the_scan() {
        let (inner, _) = keystore_with(&["alpha"]);
        let keystore = FaultyKeystore {
            inner,
            broken_alias: None,
            fail_lookups: true,
        };
        let err = resolve_key(&keystore, "alpha", &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::Keystore(KeystoreError::Io(_))));
    }

    #[test]
    fn malformed_key_aborts_the_scan() {
        let (inner, keys) = keystore_with(&["alpha", "beta"]);
        let keystore = FaultyKeystore {
            inner,
            broken_alias: Some("alpha"),
            fail_lookups: false,
        };
        // "beta" sorts after the broken "alpha", so the scan never gets to it.
        let reference = PublicIdentity::from_keypair(&keys[1]).to_string();
        let err = resolve_key(&keystore, &reference, &CancellationToken::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Keystore(KeystoreError::MalformedKey { ref alias, .. }) if alias == "alpha"
        ));

        // Direct alias lookups of healthy keys still work.
        assert!(resolve_key(&keystore, "beta", &CancellationToken::new()).is_ok());
    }

    #[test]
    fn cancelled_scan_stops() {
        let (keystore, keys) = keystore_with(&["alpha"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reference = PublicIdentity::from_keypair(&keys[0]).to_string();
        let err = resolve_key(&keystore, &reference, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
