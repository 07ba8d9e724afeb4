use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tl", about = concat!("ticklist v", env!("CARGO_PKG_VERSION"), " - tasks in lists, kept locally"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the task and list records
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/ticklist/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show all lists with task counts
    Lists,
    /// Create, rename, recolor, or delete a list
    List(ListCmd),
    /// Show the tasks of a list (default list if omitted)
    Ls(LsArgs),
    /// Show one task in full
    Show(IdArgs),
    /// Add a task
    Add(AddArgs),
    /// Change fields of a task
    Edit(EditArgs),
    /// Mark a task completed
    Done(IdArgs),
    /// Mark a task pending again
    Reopen(IdArgs),
    /// Flip a task between pending and completed
    Toggle(IdArgs),
    /// Set a task's priority
    Priority(PriorityArgs),
    /// Cycle a task's priority (low → medium → high → low)
    Bump(IdArgs),
    /// Delete a task permanently
    Rm(IdArgs),
    /// Completion statistics
    Stats(StatsArgs),
    /// View or prune the recovery log
    Recovery(RecoveryArgs),
}

// ---------------------------------------------------------------------------
// List management
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListCmd {
    #[command(subcommand)]
    pub action: ListAction,
}

#[derive(Subcommand)]
pub enum ListAction {
    /// Create a list
    Add {
        name: String,
        /// Display color (default: first unused palette color)
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename a list
    Rename { list: String, name: String },
    /// Change a list's color
    Color { list: String, color: String },
    /// Delete a list; its tasks move to the default list
    Rm { list: String },
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArgs {
    /// Task ID or unique prefix
    pub id: String,
}

#[derive(Args, Default)]
pub struct LsArgs {
    /// List id or name
    pub list: Option<String>,
    /// Filter by status (all, pending, completed)
    #[arg(long)]
    pub status: Option<String>,
    /// Sort by (due, priority, created)
    #[arg(long)]
    pub sort: Option<String>,
    /// Sort ascending
    #[arg(long, conflicts_with = "desc")]
    pub asc: bool,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

#[derive(Args)]
pub struct AddArgs {
    pub title: String,
    /// List id or name (default: the default list)
    #[arg(long, short = 'l')]
    pub list: Option<String>,
    /// Due date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub due: Option<String>,
    /// low, medium, or high
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// Initial status (pending or completed)
    #[arg(long)]
    pub status: Option<String>,
    /// Longer description
    #[arg(long = "desc")]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID or unique prefix
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long = "desc", conflicts_with = "no_desc")]
    pub description: Option<String>,
    /// Remove the description
    #[arg(long)]
    pub no_desc: bool,
    /// Due date (YYYY-MM-DD or RFC 3339)
    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<String>,
    /// Remove the due date
    #[arg(long)]
    pub no_due: bool,
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// Move to another list (id or name)
    #[arg(long, short = 'l')]
    pub list: Option<String>,
}

#[derive(Args)]
pub struct PriorityArgs {
    /// Task ID or unique prefix
    pub id: String,
    /// low, medium, or high
    pub priority: String,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Only this list (id or name)
    pub list: Option<String>,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Show only the newest N entries
    #[arg(long)]
    pub limit: Option<usize>,
    /// Remove entries older than 30 days
    #[arg(long)]
    pub prune: bool,
    /// With --prune, remove every entry
    #[arg(long, requires = "prune")]
    pub all: bool,
}
