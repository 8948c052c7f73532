use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rolesync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge PostgreSQL groups and users to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/rolesync/config.toml)
    #[arg(short, long, global = true, env = "ROLESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print reports as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge every role declared in the manifest
    Apply(ApplyArgs),

    /// Show what apply would change
    Plan(PlanArgs),

    /// Ensure a single role exists with the given attributes
    Present(PresentArgs),

    /// Ensure a single role does not exist
    Absent(AbsentArgs),

    /// Print the stored form of a password
    Hash {
        /// Role name (the hash is salted with it)
        name: String,
        /// Plaintext password
        password: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Manifest
// ============================================================================

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest declaring groups and users
    #[arg(short, long, default_value = "rolesync.toml", env = "ROLESYNC_MANIFEST")]
    pub manifest: PathBuf,

    /// Only converge these roles (repeatable)
    #[arg(short, long)]
    pub only: Vec<String>,

    /// Number of roles converged concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

// ============================================================================
// Single role
// ============================================================================

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum KindArg {
    #[default]
    Group,
    User,
}

#[derive(Args)]
pub struct PresentArgs {
    /// Role name
    pub name: String,

    /// Manage a user instead of a group
    #[arg(short, long, value_enum, default_value_t)]
    pub kind: KindArg,

    /// Password, plaintext or already hashed
    #[arg(long, env = "ROLESYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// How to interpret the password: plain or hashed
    #[arg(long)]
    pub encoding: Option<String>,

    /// Always rewrite the password without comparing stored hashes
    #[arg(long)]
    pub refresh_password: bool,

    #[arg(long)]
    pub superuser: Option<bool>,

    #[arg(long)]
    pub createdb: Option<bool>,

    #[arg(long)]
    pub createrole: Option<bool>,

    #[arg(long)]
    pub login: Option<bool>,

    #[arg(long)]
    pub inherit: Option<bool>,

    #[arg(long)]
    pub replication: Option<bool>,

    /// Maximum concurrent connections, -1 for unlimited
    #[arg(long, allow_negative_numbers = true)]
    pub connection_limit: Option<i32>,

    /// Expiry as an RFC 3339 timestamp
    #[arg(long)]
    pub valid_until: Option<String>,

    /// Groups the role must belong to (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub groups: Option<Vec<String>>,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct AbsentArgs {
    /// Role name
    pub name: String,

    /// Manage a user instead of a group
    #[arg(short, long, value_enum, default_value_t)]
    pub kind: KindArg,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,
}

impl From<KindArg> for declarative::RoleKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Group => Self::Group,
            KindArg::User => Self::User,
        }
    }
}
