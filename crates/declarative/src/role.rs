//! Role specifications and observed role state
//!
//! A [`RoleSpec`] is what the operator declared. Every comparable attribute
//! is optional: `None` means "no opinion", and such attributes are never
//! diffed or sent to the store.

use crate::credential::CredentialEncoding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Desired state of a single role
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    /// Plaintext or pre-hashed credential
    #[serde(default, alias = "password")]
    pub credential: Option<String>,
    /// How to interpret `credential`; `None` uses the run's default
    #[serde(default)]
    pub encoding: Option<CredentialEncoding>,
    #[serde(default)]
    pub superuser: Option<bool>,
    #[serde(default)]
    pub createdb: Option<bool>,
    #[serde(default, alias = "createroles")]
    pub createrole: Option<bool>,
    #[serde(default)]
    pub login: Option<bool>,
    #[serde(default)]
    pub inherit: Option<bool>,
    #[serde(default)]
    pub replication: Option<bool>,
    /// Maximum concurrent connections, `-1` for unlimited
    #[serde(default, alias = "connlimit")]
    pub connection_limit: Option<i32>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// Roles this role must be a member of
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    /// Always rewrite the credential instead of comparing stored hashes
    #[serde(default, alias = "refresh_password")]
    pub refresh_credential: bool,
}

impl RoleSpec {
    /// Create a spec that only asserts existence
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, credential: &str) -> Self {
        self.credential = Some(credential.to_string());
        self
    }

    pub fn with_encoding(mut self, encoding: CredentialEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_superuser(mut self, value: bool) -> Self {
        self.superuser = Some(value);
        self
    }

    pub fn with_createdb(mut self, value: bool) -> Self {
        self.createdb = Some(value);
        self
    }

    pub fn with_createrole(mut self, value: bool) -> Self {
        self.createrole = Some(value);
        self
    }

    pub fn with_login(mut self, value: bool) -> Self {
        self.login = Some(value);
        self
    }

    pub fn with_inherit(mut self, value: bool) -> Self {
        self.inherit = Some(value);
        self
    }

    pub fn with_replication(mut self, value: bool) -> Self {
        self.replication = Some(value);
        self
    }

    pub fn with_connection_limit(mut self, limit: i32) -> Self {
        self.connection_limit = Some(limit);
        self
    }

    pub fn with_valid_until(mut self, at: DateTime<Utc>) -> Self {
        self.valid_until = Some(at);
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_refresh_credential(mut self, refresh: bool) -> Self {
        self.refresh_credential = refresh;
        self
    }
}

// Credentials stay out of logs.
impl fmt::Debug for RoleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleSpec")
            .field("name", &self.name)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("encoding", &self.encoding)
            .field("superuser", &self.superuser)
            .field("createdb", &self.createdb)
            .field("createrole", &self.createrole)
            .field("login", &self.login)
            .field("inherit", &self.inherit)
            .field("replication", &self.replication)
            .field("connection_limit", &self.connection_limit)
            .field("valid_until", &self.valid_until)
            .field("groups", &self.groups)
            .field("refresh_credential", &self.refresh_credential)
            .finish()
    }
}

/// Attribute set passed to the store's create and update operations
///
/// `None` fields are left to the store's own defaults (on create) or left
/// untouched (on update).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RoleAttributes {
    pub superuser: Option<bool>,
    pub createdb: Option<bool>,
    pub createrole: Option<bool>,
    pub login: Option<bool>,
    pub inherit: Option<bool>,
    pub replication: Option<bool>,
    pub connection_limit: Option<i32>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Credential in its stored form
    pub credential: Option<String>,
    /// Group memberships to grant
    pub groups: Option<Vec<String>>,
}

impl RoleAttributes {
    /// Check if no attribute is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render the per-attribute change map used in reports
    ///
    /// Credentials are recorded as `true`, never by value.
    pub fn change_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        let flags = [
            ("createdb", self.createdb),
            ("inherit", self.inherit),
            ("login", self.login),
            ("createroles", self.createrole),
            ("replication", self.replication),
            ("superuser", self.superuser),
        ];
        for (key, value) in flags {
            if let Some(v) = value {
                record.insert(key.to_string(), Value::Bool(v));
            }
        }
        if let Some(limit) = self.connection_limit {
            record.insert("connlimit".to_string(), Value::from(limit));
        }
        if let Some(at) = self.valid_until {
            record.insert("valid_until".to_string(), Value::String(at.to_rfc3339()));
        }
        if let Some(groups) = &self.groups {
            record.insert(
                "groups".to_string(),
                Value::Array(groups.iter().cloned().map(Value::String).collect()),
            );
        }
        if self.credential.is_some() {
            record.insert("password".to_string(), Value::Bool(true));
        }
        record
    }
}

impl fmt::Debug for RoleAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The change record already masks the credential.
        write!(f, "RoleAttributes({})", Value::Object(self.change_record()))
    }
}

/// A spec with its credential resolved to the form the store keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRole {
    pub name: String,
    pub attributes: RoleAttributes,
    pub refresh_credential: bool,
}

/// Role state as currently held by the store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRole {
    pub name: String,
    pub superuser: bool,
    pub createdb: bool,
    pub createrole: bool,
    pub login: bool,
    pub inherit: bool,
    pub replication: bool,
    /// `-1` means unlimited
    pub connection_limit: i32,
    pub valid_until: Option<DateTime<Utc>>,
    /// Stored credential, `None` when unset or not read back
    pub credential: Option<String>,
    pub groups: Vec<String>,
}

impl ObservedRole {
    /// A freshly created role with PostgreSQL's `CREATE ROLE` defaults
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superuser: false,
            createdb: false,
            createrole: false,
            login: false,
            inherit: true,
            replication: false,
            connection_limit: -1,
            valid_until: None,
            credential: None,
            groups: Vec::new(),
        }
    }

    /// Apply an attribute set the way the store would
    ///
    /// Memberships are only ever added.
    pub fn apply(&mut self, attrs: &RoleAttributes) {
        if let Some(v) = attrs.superuser {
            self.superuser = v;
        }
        if let Some(v) = attrs.createdb {
            self.createdb = v;
        }
        if let Some(v) = attrs.createrole {
            self.createrole = v;
        }
        if let Some(v) = attrs.login {
            self.login = v;
        }
        if let Some(v) = attrs.inherit {
            self.inherit = v;
        }
        if let Some(v) = attrs.replication {
            self.replication = v;
        }
        if let Some(v) = attrs.connection_limit {
            self.connection_limit = v;
        }
        if let Some(v) = attrs.valid_until {
            self.valid_until = Some(v);
        }
        if let Some(credential) = &attrs.credential {
            self.credential = (!credential.is_empty()).then(|| credential.clone());
        }
        if let Some(groups) = &attrs.groups {
            for group in groups {
                if !self.groups.contains(group) {
                    self.groups.push(group.clone());
                }
            }
        }
    }
}

impl fmt::Debug for ObservedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedRole")
            .field("name", &self.name)
            .field("superuser", &self.superuser)
            .field("createdb", &self.createdb)
            .field("createrole", &self.createrole)
            .field("login", &self.login)
            .field("inherit", &self.inherit)
            .field("replication", &self.replication)
            .field("connection_limit", &self.connection_limit)
            .field("valid_until", &self.valid_until)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("groups", &self.groups)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_record_masks_credential() {
        let attrs = RoleAttributes {
            credential: Some("md5abc".to_string()),
            login: Some(false),
            ..Default::default()
        };
        let record = attrs.change_record();
        assert_eq!(record["password"], Value::Bool(true));
        assert_eq!(record["login"], Value::Bool(false));
        assert!(!format!("{attrs:?}").contains("md5abc"));
    }

    #[test]
    fn test_change_record_uses_role_keys() {
        let attrs = RoleAttributes {
            createrole: Some(true),
            connection_limit: Some(5),
            groups: Some(vec!["readers".to_string()]),
            ..Default::default()
        };
        let record = attrs.change_record();
        assert_eq!(record["createroles"], Value::Bool(true));
        assert_eq!(record["connlimit"], Value::from(5));
        assert_eq!(record["groups"], serde_json::json!(["readers"]));
    }

    #[test]
    fn test_empty_attributes() {
        assert!(RoleAttributes::default().is_empty());
        let attrs = RoleAttributes {
            inherit: Some(true),
            ..Default::default()
        };
        assert!(!attrs.is_empty());
    }

    #[test]
    fn test_apply_only_adds_memberships() {
        let mut role = ObservedRole::with_defaults("g");
        role.groups = vec!["a".to_string()];
        role.apply(&RoleAttributes {
            groups: Some(vec!["b".to_string(), "a".to_string()]),
            ..Default::default()
        });
        assert_eq!(role.groups, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_apply_empty_credential_clears() {
        let mut role = ObservedRole::with_defaults("g");
        role.credential = Some("md5abc".to_string());
        role.apply(&RoleAttributes {
            credential: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(role.credential, None);
    }

    #[test]
    fn test_spec_debug_redacts_credential() {
        let spec = RoleSpec::new("g").with_credential("hunter2");
        assert!(!format!("{spec:?}").contains("hunter2"));
    }

    #[test]
    fn test_spec_deserializes_aliases() {
        let spec: RoleSpec = serde_json::from_value(serde_json::json!({
            "name": "g",
            "password": "pw",
            "createroles": true,
            "connlimit": 3,
            "refresh_password": true,
        }))
        .unwrap();
        assert_eq!(spec.credential.as_deref(), Some("pw"));
        assert_eq!(spec.createrole, Some(true));
        assert_eq!(spec.connection_limit, Some(3));
        assert!(spec.refresh_credential);
    }
}
