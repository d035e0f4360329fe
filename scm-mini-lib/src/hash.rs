//! Content fingerprints (§3, §4.1).

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sha1::{Digest, Sha1};

/// The length in bytes of a fingerprint (a SHA-1 digest).
pub const OID_BYTES: usize = 20;

/// A 40-hex-digit content fingerprint identifying a blob or commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid([u8; OID_BYTES]);

impl Oid {
    /// Hash `bytes` and produce the resulting fingerprint.
    pub fn hash(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(&digest);
        Oid(buf)
    }

    /// The first 7 hex characters, used in merge-commit log headers (§6).
    pub fn log_short(&self) -> String {
        self.to_string()[..7].to_owned()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

/// Error produced when parsing a malformed fingerprint string.
#[derive(Debug, thiserror::Error)]
#[error("not a valid object id: {0:?}")]
pub struct InvalidOid(String);

impl FromStr for Oid {
    type Err = InvalidOid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| InvalidOid(s.to_owned()))?;
        if bytes.len() != OID_BYTES {
            return Err(InvalidOid(s.to_owned()));
        }
        let mut buf = [0u8; OID_BYTES];
        buf.copy_from_slice(&bytes);
        Ok(Oid(buf))
    }
}

impl Serialize for Oid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            de::Error::invalid_value(de::Unexpected::Str(&s), &"a 40-character hex object id")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        assert_eq!(Oid::hash(b"hello\n"), Oid::hash(b"hello\n"));
        assert_ne!(Oid::hash(b"hello\n"), Oid::hash(b"hello"));
    }

    #[test]
    fn round_trips_through_display_and_from_str() {
        let oid = Oid::hash(b"round trip");
        let text = oid.to_string();
        assert_eq!(text.len(), 40);
        assert_eq!(text.parse::<Oid>().unwrap(), oid);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!("not-hex".parse::<Oid>().is_err());
        assert!("abcd".parse::<Oid>().is_err());
    }

    #[test]
    fn serde_round_trips_as_a_string() {
        let oid = Oid::hash(b"serde");
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{oid}\""));
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }
}
