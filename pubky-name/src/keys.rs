//!
//! Identities derived from signing keys.
//!

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;

use pkarr::Keypair;

/// Prefix of the canonical identity rendering.
pub const IDENTITY_PREFIX: &str = "pubky";

type ParseError = <pkarr::PublicKey as TryFrom<String>>::Error;

/// The name a record is published under: the public half of a [`Keypair`].
///
/// Renders as `pubky<z32>`. Use [`PublicIdentity::z32()`] for the bare
/// z-base32 text.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicIdentity(pkarr::PublicKey);

impl PublicIdentity {
    /// Derive the identity of a signing key.
    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self(keypair.public_key())
    }

    pub fn from_public_key(public_key: &pkarr::PublicKey) -> Self {
        Self(public_key.clone())
    }

    /// Bare z-base32 form, as used in record storage and hostnames.
    pub fn z32(&self) -> String {
        self.0.to_string()
    }

    /// Whether `reference` is a textual encoding of this identity,
    /// either canonical or bare z-base32.
    pub fn matches(&self, reference: &str) -> bool {
        match reference.strip_prefix(IDENTITY_PREFIX) {
            Some(stripped) if stripped == self.z32() => true,
            _ => reference == self.z32(),
        }
    }

    pub const fn as_inner(&self) -> &pkarr::PublicKey {
        &self.0
    }

    pub fn into_inner(self) -> pkarr::PublicKey {
        self.0
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IDENTITY_PREFIX}{}", self.z32())
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicIdentity").field(&self.to_string()).finish()
    }
}

impl Deref for PublicIdentity {
    type Target = pkarr::PublicKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<pkarr::PublicKey> for PublicIdentity {
    fn from(value: pkarr::PublicKey) -> Self {
        Self(value)
    }
}

impl From<&Keypair> for PublicIdentity {
    fn from(value: &Keypair) -> Self {
        Self::from_keypair(value)
    }
}

impl FromStr for PublicIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // z-base32 of 32 bytes is always 52 characters long.
        let raw = match s.strip_prefix(IDENTITY_PREFIX) {
            Some(stripped) if stripped.len() == 52 => stripped,
            _ => s,
        };
        pkarr::PublicKey::try_from(raw.to_string()).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable_for_a_key() {
        let keypair = Keypair::from_secret_key(&[7; 32]);
        let a = PublicIdentity::from_keypair(&keypair);
        let b = PublicIdentity::from_public_key(&keypair.public_key());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), format!("pubky{}", keypair.public_key()));
    }

    #[test]
    fn matches_both_encodings() {
        let identity = PublicIdentity::from_keypair(&Keypair::random());
        assert!(identity.matches(&identity.to_string()));
        assert!(identity.matches(&identity.z32()));
        assert!(!identity.matches("pubky"));
        assert!(!identity.matches("self"));

        let other = PublicIdentity::from_keypair(&Keypair::random());
        assert!(!identity.matches(&other.to_string()));
    }

    #[test]
    fn parses_both_encodings() {
        let identity = PublicIdentity::from_keypair(&Keypair::random());
        let canonical: PublicIdentity = identity.to_string().parse().unwrap();
        let bare: PublicIdentity = identity.z32().parse().unwrap();
        assert_eq!(canonical, identity);
        assert_eq!(bare, identity);
        assert!("pubkynope".parse::<PublicIdentity>().is_err());
    }
}
