//! # pgkit
//!
//! PostgreSQL role store for the `declarative` convergence engine.
//!
//! Statements are run through the `psql` client, so no driver or TLS stack
//! is linked in. Reads are retried on transient connection errors; mutations
//! run exactly once.
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{ExecutionContext, Mode, RoleKind, RoleSpec};
//! use pgkit::{ConnectionSettings, PsqlBackend};
//!
//! let backend = PsqlBackend::new(ConnectionSettings::default())
//!     .expect("psql not available")
//!     .for_kind(RoleKind::Group);
//! let ctx = ExecutionContext::new(&backend, Mode::Apply);
//!
//! let spec = RoleSpec::new("readers").with_credential("s3cret");
//! let report = declarative::present(&spec, &ctx).expect("query failed");
//! println!("{}", report.comment);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod psql;
pub mod retry;
pub mod sql;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use psql::PsqlBackend;
pub use retry::{LogCallback, NoCallback, RetryCallback, with_retry};
pub use types::{ConnectionSettings, RetryConfig};
