//! Role store backed by the `psql` command-line client.

use crate::error::{Error, Result};
use crate::retry::{LogCallback, with_retry};
use crate::sql;
use crate::types::{ConnectionSettings, RetryConfig};
use chrono::{DateTime, Utc};
use declarative::{ObservedRole, RoleAttributes, RoleKind, RoleStore};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Backend that executes statements through `psql`.
pub struct PsqlBackend {
    /// Path to the psql executable
    psql_path: PathBuf,
    settings: ConnectionSettings,
    retry: RetryConfig,
    kind: RoleKind,
}

impl std::fmt::Debug for PsqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PsqlBackend")
            .field("psql_path", &self.psql_path)
            .field("settings", &self.settings)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// One row of [`sql::role_query`] output.
#[derive(Debug, Deserialize)]
struct RoleRow {
    name: String,
    superuser: bool,
    inherit: bool,
    createrole: bool,
    createdb: bool,
    login: bool,
    replication: bool,
    connection_limit: i32,
    valid_until: Option<DateTime<Utc>>,
    password: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

impl From<RoleRow> for ObservedRole {
    fn from(row: RoleRow) -> Self {
        Self {
            name: row.name,
            superuser: row.superuser,
            createdb: row.createdb,
            createrole: row.createrole,
            login: row.login,
            inherit: row.inherit,
            replication: row.replication,
            connection_limit: row.connection_limit,
            valid_until: row.valid_until,
            credential: row.password,
            groups: row.groups,
        }
    }
}

impl PsqlBackend {
    /// Create a backend, locating psql from the settings or `PATH`.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        let psql = settings.psql.as_deref().unwrap_or("psql");
        let psql_path = which::which(psql).map_err(|_| Error::PsqlNotFound)?;
        Ok(Self::with_path(psql_path, settings))
    }

    /// Create a backend with an explicit psql path, without checking it.
    pub fn with_path(psql_path: impl Into<PathBuf>, settings: ConnectionSettings) -> Self {
        Self {
            psql_path: psql_path.into(),
            settings,
            retry: RetryConfig::default(),
            kind: RoleKind::Group,
        }
    }

    /// Set the retry policy for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set whether roles are created as groups or users.
    pub fn for_kind(mut self, kind: RoleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Program and arguments for running `sql`.
    ///
    /// With `runas` set, psql is started through `sudo -u`. sudo resets the
    /// environment, so `PGPASSWORD` has to be preserved explicitly.
    fn command_line(&self, sql: &str) -> (PathBuf, Vec<String>) {
        let psql = self.psql_path.to_string_lossy().to_string();
        let mut args: Vec<String> = Vec::new();

        let program = match &self.settings.runas {
            Some(user) => {
                if self.settings.password.is_some() {
                    args.push("--preserve-env=PGPASSWORD".to_string());
                }
                args.extend(["-u".to_string(), user.clone(), psql]);
                PathBuf::from("sudo")
            }
            None => self.psql_path.clone(),
        };

        args.extend(
            ["-X", "-A", "-t", "-q", "-v", "ON_ERROR_STOP=1", "--no-password"]
                .into_iter()
                .map(String::from),
        );
        if let Some(host) = &self.settings.host {
            args.extend(["-h".to_string(), host.clone()]);
        }
        if let Some(port) = self.settings.port {
            args.extend(["-p".to_string(), port.to_string()]);
        }
        if let Some(user) = &self.settings.user {
            args.extend(["-U".to_string(), user.clone()]);
        }
        if let Some(db) = &self.settings.maintenance_db {
            args.extend(["-d".to_string(), db.clone()]);
        }
        args.extend(["-c".to_string(), sql.to_string()]);

        (program, args)
    }

    /// Run a statement and return the raw output.
    fn run_psql(&self, sql: &str) -> Result<Output> {
        let (program, args) = self.command_line(sql);
        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(password) = &self.settings.password {
            command.env("PGPASSWORD", password);
        }

        debug!("psql: {sql}");
        command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::PsqlNotFound
            } else {
                Error::Io(e)
            }
        })
    }

    /// Run a statement and check for success.
    fn run_psql_checked(&self, sql: &str) -> Result<String> {
        let output = self.run_psql(sql)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_psql_output(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a read-only statement, retrying transient failures.
    fn read(&self, sql: &str) -> Result<String> {
        with_retry(&self.retry, Some(&LogCallback), || self.run_psql_checked(sql))
    }

    /// Fetch the role's current state.
    pub fn fetch(&self, name: &str, with_credential: bool) -> Result<Option<ObservedRole>> {
        let stdout = self.read(&sql::role_query(name, with_credential))?;
        parse_role_output(&stdout)
    }

    /// Whether a role with this name exists.
    pub fn role_exists(&self, name: &str) -> Result<bool> {
        let stdout = self.read(&sql::role_exists(name))?;
        Ok(stdout.trim() == "1")
    }

    /// Run mutation statements in one psql invocation. Never retried.
    fn execute(&self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.run_psql_checked(&statements.join("; "))?;
        Ok(())
    }
}

/// Parse the output of [`sql::role_query`]; no row means no role.
fn parse_role_output(stdout: &str) -> Result<Option<ObservedRole>> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
    match line {
        None => Ok(None),
        Some(json) => {
            let row: RoleRow = serde_json::from_str(json)?;
            Ok(Some(row.into()))
        }
    }
}

impl RoleStore for PsqlBackend {
    fn query(&self, name: &str, with_credential: bool) -> anyhow::Result<Option<ObservedRole>> {
        Ok(self.fetch(name, with_credential)?)
    }

    fn exists(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.role_exists(name)?)
    }

    fn create(&self, name: &str, attrs: &RoleAttributes) -> anyhow::Result<bool> {
        self.execute(&[sql::create_role(self.kind, name, attrs)])?;
        Ok(true)
    }

    fn update(&self, name: &str, attrs: &RoleAttributes) -> anyhow::Result<bool> {
        self.execute(&sql::update_role(name, attrs))?;
        Ok(true)
    }

    fn remove(&self, name: &str) -> anyhow::Result<bool> {
        self.execute(&[sql::drop_role(name)])?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(settings: ConnectionSettings) -> PsqlBackend {
        PsqlBackend::with_path("/usr/bin/psql", settings)
    }

    #[test]
    fn test_command_line_defaults() {
        let (program, args) = backend(ConnectionSettings::default()).command_line("SELECT 1");
        assert_eq!(program, PathBuf::from("/usr/bin/psql"));
        assert_eq!(
            args,
            vec!["-X", "-A", "-t", "-q", "-v", "ON_ERROR_STOP=1", "--no-password", "-c", "SELECT 1"]
        );
    }

    #[test]
    fn test_command_line_with_connection() {
        let settings = ConnectionSettings {
            host: Some("db.internal".to_string()),
            port: Some(5433),
            user: Some("admin".to_string()),
            maintenance_db: Some("postgres".to_string()),
            ..Default::default()
        };
        let (_, args) = backend(settings).command_line("SELECT 1");
        let joined = args.join(" ");
        assert!(joined.contains("-h db.internal -p 5433 -U admin -d postgres"));
        assert_eq!(args.last().map(String::as_str), Some("SELECT 1"));
    }

    #[test]
    fn test_command_line_runas() {
        let settings = ConnectionSettings {
            runas: Some("postgres".to_string()),
            ..Default::default()
        };
        let (program, args) = backend(settings).command_line("SELECT 1");
        assert_eq!(program, PathBuf::from("sudo"));
        assert_eq!(&args[..3], &["-u", "postgres", "/usr/bin/psql"]);
    }

    #[test]
    fn test_command_line_runas_keeps_password() {
        let settings = ConnectionSettings {
            runas: Some("postgres".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let (program, args) = backend(settings).command_line("SELECT 1");
        assert_eq!(program, PathBuf::from("sudo"));
        assert_eq!(
            &args[..4],
            &["--preserve-env=PGPASSWORD", "-u", "postgres", "/usr/bin/psql"]
        );
        // Only through the environment, never on the command line
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[cfg(unix)]
    #[test]
    fn test_unexecutable_psql_is_io_error() {
        // A directory exists but cannot be executed
        let result =
            PsqlBackend::with_path("/", ConnectionSettings::default()).run_psql("SELECT 1");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_parse_empty_output_is_absent() {
        assert!(parse_role_output("").unwrap().is_none());
        assert!(parse_role_output("\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_role_row() {
        let out = r#"{"name" : "groupname", "superuser" : false, "inherit" : true, "createrole" : false, "createdb" : true, "login" : false, "replication" : false, "connection_limit" : -1, "valid_until" : "2030-01-01T00:00:00+00:00", "password" : "md58b14c378fab8ef0dc227f4e6d6787a87", "groups" : ["readers"]}
"#;
        let role = parse_role_output(out).unwrap().unwrap();
        assert_eq!(role.name, "groupname");
        assert!(role.createdb);
        assert!(role.inherit);
        assert_eq!(role.connection_limit, -1);
        assert!(role.valid_until.is_some());
        assert_eq!(
            role.credential.as_deref(),
            Some("md58b14c378fab8ef0dc227f4e6d6787a87")
        );
        assert_eq!(role.groups, vec!["readers".to_string()]);
    }

    #[test]
    fn test_parse_role_row_without_credential() {
        let out = r#"{"name" : "g", "superuser" : false, "inherit" : true, "createrole" : false, "createdb" : false, "login" : false, "replication" : false, "connection_limit" : -1, "valid_until" : null, "password" : null, "groups" : []}"#;
        let role = parse_role_output(out).unwrap().unwrap();
        assert_eq!(role.credential, None);
        assert!(role.groups.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(parse_role_output("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_psql_binary() {
        let result = backend(ConnectionSettings::default())
            .with_retry(RetryConfig::no_retry())
            .run_psql("SELECT 1");
        // Only meaningful on hosts without a psql at that path
        if !std::path::Path::new("/usr/bin/psql").exists() {
            assert!(matches!(result, Err(Error::PsqlNotFound)));
        }
    }
}
