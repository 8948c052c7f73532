//! Execution context and provider traits
//!
//! These traits allow the engine to be used without depending on a
//! specific database driver, terminal UI, or prompt implementation.

use crate::credential::CredentialEncoding;
use crate::role::{ObservedRole, RoleAttributes};
use crate::types::{Mode, Report};
use anyhow::Result;
use std::fmt;

/// Backing store holding roles
///
/// Implement this trait to connect the engine to a real database. The
/// engine calls `query` and `exists` in every mode and the mutating methods
/// only in [`Mode::Apply`]. Mutations return `Ok(false)` when the store
/// refused the change without a more specific error.
pub trait RoleStore: Send + Sync {
    /// Read a role, or `None` if it does not exist
    ///
    /// When `with_credential` is false the stored credential is not read
    /// and `ObservedRole::credential` is `None`.
    fn query(&self, name: &str, with_credential: bool) -> Result<Option<ObservedRole>>;

    /// Check if a role exists
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.query(name, false)?.is_some())
    }

    /// Create a role with the given attributes
    fn create(&self, name: &str, attrs: &RoleAttributes) -> Result<bool>;

    /// Change the given attributes of an existing role
    fn update(&self, name: &str, attrs: &RoleAttributes) -> Result<bool>;

    /// Drop a role
    fn remove(&self, name: &str) -> Result<bool>;
}

/// Kind of role being converged, used for wording in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleKind {
    #[default]
    Group,
    User,
}

impl RoleKind {
    /// Lowercase noun ("group")
    pub fn noun(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }

    /// Capitalized noun ("Group")
    pub fn title(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::User => "User",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Everything a convergence call needs besides the desired role itself
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Store used for reads and, in apply mode, writes
    pub store: &'a dyn RoleStore,
    /// Whether mutations are performed
    pub mode: Mode,
    /// Encoding used for specs that leave it unset
    pub default_encoding: CredentialEncoding,
    /// Kind of role, for report wording
    pub kind: RoleKind,
}

impl<'a> ExecutionContext<'a> {
    /// Create a context for groups with the default `plain` encoding
    pub fn new(store: &'a dyn RoleStore, mode: Mode) -> Self {
        Self {
            store,
            mode,
            default_encoding: CredentialEncoding::default(),
            kind: RoleKind::default(),
        }
    }

    pub fn with_default_encoding(mut self, encoding: CredentialEncoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn with_kind(mut self, kind: RoleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Same context with a different mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Check if this is a dry run
    pub fn dry_run(&self) -> bool {
        self.mode.is_dry_run()
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("mode", &self.mode)
            .field("default_encoding", &self.default_encoding)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Progress callback for batch convergence
pub trait ProgressCallback: Send {
    /// Called before the first role is converged
    fn on_batch_start(&mut self, count: usize, mode: Mode);

    /// Called when starting to converge a single role
    fn on_role_start(&mut self, name: &str);

    /// Called when a role's report is ready
    fn on_role_complete(&mut self, report: &Report);

    /// Called when the batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _mode: Mode) {}
    fn on_role_start(&mut self, _name: &str) {}
    fn on_role_complete(&mut self, _report: &Report) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
