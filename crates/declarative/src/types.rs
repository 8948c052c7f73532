//! Core types for declarative role convergence

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution mode of a convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Perform mutations through the store
    #[default]
    Apply,
    /// Decide and report, never mutate
    DryRun,
}

impl Mode {
    /// Build a mode from a `--dry-run` style flag
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Apply }
    }

    /// Check if mutations are suppressed
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Whether a role should exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ensure {
    /// Role must exist with the declared attributes
    #[default]
    Present,
    /// Role must not exist
    Absent,
}

/// The class of a convergence decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Nothing to do
    #[default]
    NoOp,
    /// Role has to be created
    Create,
    /// Some attributes have to be changed
    Update,
    /// Role has to be dropped
    Remove,
}

impl Action {
    /// Check if the action mutates the store
    pub fn is_change(self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Outcome of converging one role
///
/// Serializes as `{"name", "result", "comment", "changes"}`. `result` is
/// `null` only for dry-run previews and `changes` stays empty unless a real
/// mutation succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub result: Option<bool>,
    pub comment: String,
    pub changes: Map<String, Value>,
    /// Decision class behind this report
    #[serde(skip)]
    pub action: Action,
}

impl Report {
    /// Create a successful, empty report
    pub fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            result: Some(true),
            comment: String::new(),
            changes: Map::new(),
            action,
        }
    }

    /// Mark the report as a dry-run preview
    pub(crate) fn pending(mut self, comment: String) -> Self {
        self.result = None;
        self.comment = comment;
        self.changes.clear();
        self
    }

    /// Mark the report as failed
    pub(crate) fn failed(mut self, comment: String) -> Self {
        self.result = Some(false);
        self.comment = comment;
        self.changes.clear();
        self
    }

    /// Mark the report as successful
    pub(crate) fn succeeded(mut self, comment: String) -> Self {
        self.result = Some(true);
        self.comment = comment;
        self
    }

    /// Record the change entry for this role
    pub(crate) fn with_change(mut self, value: Value) -> Self {
        self.changes.insert(self.name.clone(), value);
        self
    }

    /// Check if this is a dry-run preview
    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }

    /// Check if convergence failed
    pub fn is_failure(&self) -> bool {
        self.result == Some(false)
    }

    /// Check if a real mutation was recorded
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Summary of a batch of reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub pending: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of roles processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.pending + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
        self.pending += other.pending;
        self.failed += other.failed;
    }

    /// Add a report to the summary
    pub fn add_report(&mut self, report: &Report) {
        match report.result {
            None => self.pending += 1,
            Some(false) => self.failed += 1,
            Some(true) => match report.action {
                Action::NoOp => self.unchanged += 1,
                Action::Create => self.created += 1,
                Action::Update => self.updated += 1,
                Action::Remove => self.removed += 1,
            },
        }
    }
}
