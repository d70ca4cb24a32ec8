//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Local cache and fuzzy search over remote Notion collections.
#[derive(Debug, Parser)]
#[command(name = "tagcache", author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search a collection's cached pages.
    Search(SearchArgs),
    /// Refresh one collection if its snapshot is stale.
    Refresh(RefreshArgs),
    /// Download every mirror snapshot, then sync every collection.
    Update,
    /// Show snapshot freshness for every collection.
    Status,
    /// Bring every expired collection up to date, mirror first.
    Check,
    /// Fetch every collection from Notion and write mirror snapshots.
    Export(ExportArgs),
    /// Derive tags from the pages matching a query.
    Tags(TagsArgs),
    /// Group existing tags by page and section.
    Simplify(SimplifyArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Collection name or id; defaults to the last one used.
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Search text.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Maximum number of results to print.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Collection name or id; defaults to the last one used.
    pub collection: Option<String>,

    /// Sync from Notion even if the snapshot is fresh.
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Tag property to read; empty selects the main tag.
    #[arg(long, short = 'p')]
    pub property: Option<String>,

    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SimplifyArgs {
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Full tags, e.g. `#Malleus_CM::#Subjects::Cardiology::STEMI::02_Aetiology`.
    #[arg(required = true, num_args = 1..)]
    pub tags: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Directory for the `<collection id>.json` files.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print the JSON schema instead of the current values.
    #[arg(long)]
    pub schema: bool,
}
