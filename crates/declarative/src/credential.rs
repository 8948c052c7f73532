//! Desired-state credential resolution
//!
//! Stored credentials use PostgreSQL's md5 scheme: the literal tag `md5`
//! followed by the hex digest of `secret ++ role_name`. The role name acts as
//! the salt, so the same secret for the same role always resolves to the same
//! stored value and can be compared without ever reading a plaintext back.

use crate::error::Error;
use crate::role::{CanonicalRole, RoleAttributes, RoleSpec};
use log::debug;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix carried by every stored md5 credential
pub const HASH_TAG: &str = "md5";

/// How a declared credential should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CredentialEncoding {
    /// Credential is plaintext and gets hashed before comparison
    #[default]
    Plain,
    /// Credential is passed to the store verbatim
    Hashed,
}

impl FromStr for CredentialEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "md5" => Ok(Self::Plain),
            "hashed" | "none" | "false" => Ok(Self::Hashed),
            _ => Err(Error::UnknownEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for CredentialEncoding {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CredentialEncoding> for String {
    fn from(encoding: CredentialEncoding) -> Self {
        encoding.to_string()
    }
}

impl fmt::Display for CredentialEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Hashed => write!(f, "hashed"),
        }
    }
}

/// Compute the stored form of `secret` for role `name`
pub fn salted_hash(secret: &str, name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret.as_bytes());
    hasher.update(name.as_bytes());
    format!("{HASH_TAG}{}", hex::encode(hasher.finalize()))
}

/// Check if a value already looks like a stored credential
///
/// This is a prefix check only. A plaintext secret that happens to start
/// with `md5` is indistinguishable from a hash and is passed through.
pub fn is_prehashed(value: &str) -> bool {
    value.starts_with(HASH_TAG)
}

/// Resolve one credential to its stored form
///
/// An empty credential means "no password" and is never hashed.
pub fn resolve_credential(
    name: &str,
    secret: &str,
    encoding: Option<CredentialEncoding>,
    default_encoding: CredentialEncoding,
) -> String {
    if secret.is_empty() {
        return String::new();
    }
    if is_prehashed(secret) {
        debug!("credential for {name} already carries the {HASH_TAG} tag");
        return secret.to_string();
    }
    match encoding.unwrap_or(default_encoding) {
        CredentialEncoding::Plain => salted_hash(secret, name),
        CredentialEncoding::Hashed => secret.to_string(),
    }
}

/// Normalize a spec into its canonical, comparable form
pub fn resolve(spec: &RoleSpec, default_encoding: CredentialEncoding) -> CanonicalRole {
    let credential = spec
        .credential
        .as_deref()
        .map(|secret| resolve_credential(&spec.name, secret, spec.encoding, default_encoding));

    CanonicalRole {
        name: spec.name.clone(),
        attributes: RoleAttributes {
            superuser: spec.superuser,
            createdb: spec.createdb,
            createrole: spec.createrole,
            login: spec.login,
            inherit: spec.inherit,
            replication: spec.replication,
            connection_limit: spec.connection_limit,
            valid_until: spec.valid_until,
            credential,
            groups: spec.groups.clone(),
        },
        refresh_credential: spec.refresh_credential,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5_PW: &str = "md58b14c378fab8ef0dc227f4e6d6787a87";

    #[test]
    fn test_salted_hash_known_value() {
        assert_eq!(salted_hash("password", "groupname"), MD5_PW);
    }

    #[test]
    fn test_salt_is_role_name() {
        assert_ne!(salted_hash("password", "a"), salted_hash("password", "b"));
        assert_eq!(salted_hash("password", "a"), salted_hash("password", "a"));
    }

    #[test]
    fn test_plain_and_prehashed_resolve_identically() {
        let plain = resolve(
            &RoleSpec::new("groupname")
                .with_credential("password")
                .with_encoding(CredentialEncoding::Plain),
            CredentialEncoding::Plain,
        );
        let hashed = resolve(
            &RoleSpec::new("groupname")
                .with_credential(&salted_hash("password", "groupname"))
                .with_encoding(CredentialEncoding::Hashed),
            CredentialEncoding::Plain,
        );
        assert_eq!(plain.attributes.credential, hashed.attributes.credential);
    }

    #[test]
    fn test_hash_tag_wins_over_declared_plain() {
        let resolved = resolve_credential(
            "groupname",
            MD5_PW,
            Some(CredentialEncoding::Plain),
            CredentialEncoding::Plain,
        );
        assert_eq!(resolved, MD5_PW);
    }

    #[test]
    fn test_hashed_passes_plaintext_through() {
        let resolved = resolve_credential(
            "groupname",
            "password",
            Some(CredentialEncoding::Hashed),
            CredentialEncoding::Plain,
        );
        assert_eq!(resolved, "password");
    }

    #[test]
    fn test_default_encoding_applies_when_unset() {
        assert_eq!(
            resolve_credential("groupname", "password", None, CredentialEncoding::Plain),
            MD5_PW
        );
        assert_eq!(
            resolve_credential("groupname", "password", None, CredentialEncoding::Hashed),
            "password"
        );
    }

    #[test]
    fn test_empty_credential_not_hashed() {
        assert_eq!(
            resolve_credential("groupname", "", None, CredentialEncoding::Plain),
            ""
        );
    }

    #[test]
    fn test_resolve_keeps_unspecified_attributes_unset() {
        let canonical = resolve(&RoleSpec::new("g").with_login(true), CredentialEncoding::Plain);
        assert_eq!(canonical.attributes.login, Some(true));
        assert_eq!(canonical.attributes.createdb, None);
        assert_eq!(canonical.attributes.credential, None);
    }

    #[test]
    fn test_encoding_parse() {
        assert_eq!("plain".parse::<CredentialEncoding>().unwrap(), CredentialEncoding::Plain);
        assert_eq!("MD5".parse::<CredentialEncoding>().unwrap(), CredentialEncoding::Plain);
        assert_eq!("hashed".parse::<CredentialEncoding>().unwrap(), CredentialEncoding::Hashed);
        assert!(matches!(
            "scram-sha-256".parse::<CredentialEncoding>(),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_encoding_serde_rejects_unknown() {
        let ok: CredentialEncoding = serde_json::from_str("\"hashed\"").unwrap();
        assert_eq!(ok, CredentialEncoding::Hashed);
        assert!(serde_json::from_str::<CredentialEncoding>("\"rot13\"").is_err());
    }
}
