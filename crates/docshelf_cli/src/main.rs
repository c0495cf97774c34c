//! docshelf CLI
//!
//! Command-line tools for docshelf databases.
//!
//! # Commands
//!
//! - `inspect` - Display stores, indexes and record counts
//! - `ensure-store` - Register a store and migrate the database to it
//! - `put`, `get`, `delete`, `clear` - Record operations
//! - `query` - Run a filter over a store or index
//! - `search` - Full-text search
//! - `verify` - Cross-check records against their index entries
//! - `compact` - Rewrite the commit log to hold only live records

mod commands;

use clap::{Parser, Subcommand};
use commands::Target;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// docshelf command-line database tools.
#[derive(Parser)]
#[command(name = "docshelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database directories
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Database name
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Schema version to open the database at
    #[arg(global = true, long)]
    db_version: Option<u32>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display stores, indexes and record counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Register a store, creating it and its indexes if missing
    EnsureStore {
        /// Store name
        store: String,

        /// Primary key path (dotted)
        #[arg(short, long)]
        key: String,

        /// Generate numeric keys for records without one
        #[arg(short, long)]
        auto_increment: bool,

        /// Secondary index as NAME:PATH or NAME:PATH:unique
        #[arg(short, long = "index")]
        indexes: Vec<String>,
    },

    /// Insert or replace a record given as JSON
    Put {
        /// Store name
        store: String,

        /// Record as a JSON object
        record: String,
    },

    /// Print the record with the given key
    Get {
        /// Store name
        store: String,

        /// Key as JSON (`"1"` for text, `1` for a number)
        key: String,
    },

    /// Delete the record with the given key
    Delete {
        /// Store name
        store: String,

        /// Key as JSON
        key: String,
    },

    /// Delete every record of a store
    Clear {
        /// Store name
        store: String,
    },

    /// Run a filter over a store or one of its indexes
    Query {
        /// Store name
        store: String,

        /// Filter kind (eq, prefix, gte, lte, gt, lt, substring)
        #[arg(short, long)]
        filter: String,

        /// Filter value as JSON; substring accepts bare text
        #[arg(long)]
        value: String,

        /// Field to match for substring filters
        #[arg(long)]
        field: Option<String>,

        /// Index to query instead of the primary keys
        #[arg(short, long)]
        index: Option<String>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,

        /// Rows per page
        #[arg(short, long)]
        rows: Option<u32>,
    },

    /// Case-insensitive full-text search
    Search {
        /// Store name
        store: String,

        /// Text to look for
        text: String,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,

        /// Rows per page
        #[arg(short, long)]
        rows: Option<u32>,
    },

    /// Cross-check records against their index entries
    Verify,

    /// Rewrite the commit log to hold only live records
    Compact,

    /// Show version information
    Version,
}

impl Commands {
    /// Subcommand name as typed on the command line.
    const fn name(&self) -> &'static str {
        match self {
            Self::Inspect { .. } => "inspect",
            Self::EnsureStore { .. } => "ensure-store",
            Self::Put { .. } => "put",
            Self::Get { .. } => "get",
            Self::Delete { .. } => "delete",
            Self::Clear { .. } => "clear",
            Self::Query { .. } => "query",
            Self::Search { .. } => "search",
            Self::Verify => "verify",
            Self::Compact => "compact",
            Self::Version => "version",
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let target = Target {
        path: cli.path,
        name: cli.name,
        version: cli.db_version,
    };

    debug!(command = cli.command.name(), ?target, "dispatching command");
    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&target, &format)?,
        Commands::EnsureStore {
            store,
            key,
            auto_increment,
            indexes,
        } => commands::store::ensure(&target, &store, &key, auto_increment, &indexes)?,
        Commands::Put { store, record } => commands::records::put(&target, &store, &record)?,
        Commands::Get { store, key } => commands::records::get(&target, &store, &key)?,
        Commands::Delete { store, key } => commands::records::delete(&target, &store, &key)?,
        Commands::Clear { store } => commands::records::clear(&target, &store)?,
        Commands::Query {
            store,
            filter,
            value,
            field,
            index,
            page,
            rows,
        } => {
            let request = commands::query::QueryRequest {
                filter: &filter,
                value: &value,
                field,
                index: index.as_deref(),
                page,
                rows,
            };
            commands::query::query(&target, &store, request)?;
        }
        Commands::Search {
            store,
            text,
            page,
            rows,
        } => commands::query::search(&target, &store, &text, page, rows)?,
        Commands::Verify => commands::verify::run(&target)?,
        Commands::Compact => commands::compact::run(&target)?,
        Commands::Version => {
            println!("docshelf CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("docshelf core v{}", docshelf_core::VERSION);
        }
    }

    Ok(())
}

