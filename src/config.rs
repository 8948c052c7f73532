use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{CredentialEncoding, Desired, Ensure, RoleKind, RoleSpec};
use pgkit::{ConnectionSettings, RetryConfig};
use serde::{Deserialize, Deserializer, de};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rolesync"))
}

// ============================================================================
// Settings
// ============================================================================

/// Settings from `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub defaults: Defaults,
    pub retry: RetrySettings,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    /// Password encoding for roles that do not name one
    pub encoding: CredentialEncoding,
    /// Roles converged concurrently
    pub jobs: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            encoding: CredentialEncoding::default(),
            jobs: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay.as_millis() as u64,
            backoff_factor: config.backoff_factor,
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_factor,
        )
    }
}

impl Settings {
    /// Load settings from `path`, or the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = config_dir()?.join("config.toml");
                if !default.exists() {
                    log::debug!("No settings at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// One `[[group]]` or `[[user]]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "EntryTable")]
pub struct ManifestEntry {
    pub ensure: Ensure,
    pub spec: RoleSpec,
}

/// Table as written in the manifest; misspelled keys are rejected
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryTable {
    name: String,
    #[serde(default)]
    ensure: Ensure,
    #[serde(default, alias = "credential")]
    password: Option<String>,
    #[serde(default)]
    encoding: Option<CredentialEncoding>,
    #[serde(default)]
    superuser: Option<bool>,
    #[serde(default)]
    createdb: Option<bool>,
    #[serde(default, alias = "createroles")]
    createrole: Option<bool>,
    #[serde(default)]
    login: Option<bool>,
    #[serde(default)]
    inherit: Option<bool>,
    #[serde(default)]
    replication: Option<bool>,
    #[serde(default, alias = "connlimit")]
    connection_limit: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    groups: Option<Vec<String>>,
    #[serde(default, alias = "refresh_credential")]
    refresh_password: bool,
}

impl From<EntryTable> for ManifestEntry {
    fn from(table: EntryTable) -> Self {
        Self {
            ensure: table.ensure,
            spec: RoleSpec {
                name: table.name,
                credential: table.password,
                encoding: table.encoding,
                superuser: table.superuser,
                createdb: table.createdb,
                createrole: table.createrole,
                login: table.login,
                inherit: table.inherit,
                replication: table.replication,
                connection_limit: table.connection_limit,
                valid_until: table.valid_until,
                groups: table.groups,
                refresh_credential: table.refresh_password,
            },
        }
    }
}

/// Accepts a TOML offset datetime or an RFC 3339 string
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match toml::Value::deserialize(deserializer)? {
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::String(s) => s,
        other => {
            return Err(de::Error::custom(format!(
                "expected a timestamp, found {}",
                other.type_str()
            )));
        }
    };
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| de::Error::custom(format!("invalid timestamp '{text}': {e}")))
}

impl ManifestEntry {
    pub fn to_desired(&self) -> Desired {
        match self.ensure {
            Ensure::Present => Desired::Present(self.spec.clone()),
            Ensure::Absent => Desired::Absent(self.spec.name.clone()),
        }
    }
}

/// Declared roles
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "group")]
    pub groups: Vec<ManifestEntry>,
    #[serde(default, rename = "user")]
    pub users: Vec<ManifestEntry>,
}

impl Manifest {
    /// Load and validate a manifest
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let manifest: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Groups and users share one namespace on the server, so a name may
    /// only be declared once across both.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in self.groups.iter().chain(&self.users) {
            let name = entry.spec.name.as_str();
            if name.is_empty() {
                bail!("Manifest entry with an empty name");
            }
            if !seen.insert(name) {
                bail!("Role '{name}' is declared more than once");
            }
        }
        Ok(())
    }

    /// Entries of one kind, optionally restricted to `only`
    pub fn entries(&self, kind: RoleKind, only: &[String]) -> Vec<Desired> {
        let list = match kind {
            RoleKind::Group => &self.groups,
            RoleKind::User => &self.users,
        };
        list.iter()
            .filter(|e| only.is_empty() || only.contains(&e.spec.name))
            .map(ManifestEntry::to_desired)
            .collect()
    }

    /// Names from `only` that the manifest does not declare
    pub fn unknown<'a>(&self, only: &'a [String]) -> Vec<&'a str> {
        only.iter()
            .filter(|name| {
                !self
                    .groups
                    .iter()
                    .chain(&self.users)
                    .any(|e| &e.spec.name == *name)
            })
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.defaults.jobs, 4);
        assert_eq!(settings.defaults.encoding, CredentialEncoding::Plain);
        assert_eq!(settings.retry.to_config(), RetryConfig::default());
    }

    #[test]
    fn test_settings_load_explicit() {
        let file = write_temp(
            r#"
[connection]
host = "db.internal"
port = 5433
runas = "postgres"

[defaults]
encoding = "hashed"
jobs = 2

[retry]
max_attempts = 5
base_delay_ms = 250
"#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.connection.host.as_deref(), Some("db.internal"));
        assert_eq!(settings.connection.port, Some(5433));
        assert_eq!(settings.connection.runas.as_deref(), Some("postgres"));
        assert_eq!(settings.defaults.encoding, CredentialEncoding::Hashed);
        assert_eq!(settings.defaults.jobs, 2);
        assert_eq!(settings.retry.to_config().max_attempts, 5);
        assert_eq!(
            settings.retry.to_config().base_delay,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_settings_rejects_unknown_encoding() {
        let file = write_temp("[defaults]\nencoding = \"rot13\"\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_settings_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_manifest_load() {
        let file = write_temp(
            r#"
[[group]]
name = "readers"

[[group]]
name = "writers"
password = "s3cret"
groups = ["readers"]

[[group]]
name = "legacy"
ensure = "absent"

[[user]]
name = "alice"
login = true
connlimit = 5
valid_until = "2030-01-01T00:00:00Z"
groups = ["writers"]
"#,
        );

        let manifest = Manifest::load(file.path()).unwrap();
        assert_eq!(manifest.groups.len(), 3);
        assert_eq!(manifest.users.len(), 1);

        let writers = &manifest.groups[1].spec;
        assert_eq!(writers.credential.as_deref(), Some("s3cret"));
        assert_eq!(writers.groups, Some(vec!["readers".to_string()]));

        let alice = &manifest.users[0].spec;
        assert_eq!(alice.login, Some(true));
        assert_eq!(alice.connection_limit, Some(5));
        assert!(alice.valid_until.is_some());

        let groups = manifest.entries(RoleKind::Group, &[]);
        assert!(matches!(&groups[2], Desired::Absent(name) if name == "legacy"));
    }

    #[test]
    fn test_manifest_rejects_misspelled_attribute() {
        let file = write_temp(
            r#"
[[group]]
name = "admins"
supersuer = true
"#,
        );
        let err = Manifest::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("supersuer"));
    }

    #[test]
    fn test_manifest_valid_until_bare_datetime() {
        let manifest: Manifest = toml::from_str(
            r#"
[[user]]
name = "alice"
valid_until = 2030-01-01T00:00:00Z

[[user]]
name = "bob"
valid_until = "2030-01-01T02:00:00+02:00"
"#,
        )
        .unwrap();

        let expected = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(manifest.users[0].spec.valid_until, Some(expected));
        assert_eq!(manifest.users[1].spec.valid_until, Some(expected));
    }

    #[test]
    fn test_manifest_valid_until_needs_offset() {
        let result = toml::from_str::<Manifest>(
            r#"
[[user]]
name = "alice"
valid_until = 2030-01-01
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_manifest_rejects_duplicates_across_kinds() {
        let file = write_temp(
            r#"
[[group]]
name = "app"

[[user]]
name = "app"
"#,
        );
        let err = Manifest::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_manifest_only_filter() {
        let manifest: Manifest = toml::from_str(
            r#"
[[group]]
name = "a"

[[group]]
name = "b"
"#,
        )
        .unwrap();

        let only = vec!["b".to_string(), "zzz".to_string()];
        let entries = manifest.entries(RoleKind::Group, &only);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "b");
        assert_eq!(manifest.unknown(&only), vec!["zzz"]);
    }
}
