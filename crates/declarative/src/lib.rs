//! # Declarative
//!
//! Declarative convergence for database roles.
//!
//! This crate decides the minimal action needed to bring a role (a user or a
//! group) from its observed state to the state an operator declared, and
//! renders that decision as a [`Report`]. It never talks to a database
//! itself: every read and write goes through a [`RoleStore`] supplied by the
//! caller.
//!
//! ## Core Concepts
//!
//! - **RoleSpec**: the desired state, as declared by the operator
//! - **CanonicalRole**: a spec with its credential resolved to the stored form
//! - **ObservedRole**: what the store currently holds
//! - **Decision**: no-op, create, update or remove
//! - **Report**: `{name, result, comment, changes}` for one role
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecutionContext, Mode, RoleSpec, present};
//!
//! let spec = RoleSpec::new("analysts")
//!     .with_credential("s3cret")
//!     .with_login(false);
//!
//! let ctx = ExecutionContext::new(&store, Mode::DryRun);
//! let report = present(&spec, &ctx)?;
//! assert_eq!(report.result, None);
//! ```
//!
//! ## Execution context
//!
//! Nothing in this crate reads process-wide state. The execution mode, the
//! default credential encoding and the store are chosen once by the caller
//! and passed down through [`ExecutionContext`]. In [`Mode::DryRun`] the
//! engine only ever calls the read half of [`RoleStore`].

pub mod context;
pub mod credential;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod role;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, ExecutionContext, NoProgress, ProgressCallback,
    RoleKind, RoleStore,
};
pub use credential::{CredentialEncoding, HASH_TAG, is_prehashed, resolve, salted_hash};
pub use diff::diff;
pub use engine::{Decision, absent, decide_absent, decide_present, present};
pub use error::{Error, Result};
pub use executor::{BatchOutcome, Desired, ExecuteOptions, converge_all};
pub use role::{CanonicalRole, ObservedRole, RoleAttributes, RoleSpec};
pub use types::{Action, Ensure, ExecuteSummary, Mode, Report};
