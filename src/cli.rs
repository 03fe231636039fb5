use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aphrodite")]
#[command(author, version, about = "Poster badging for Jellyfin-class media servers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Badge one item's poster and wait for the result
    Badge {
        /// Catalog item ID
        #[arg(required = true)]
        item_id: String,

        /// Badge types to apply (default: all)
        #[arg(long, value_delimiter = ',')]
        badges: Vec<String>,
    },

    /// Badge every item in a library as one batch job
    Batch {
        /// Library ID to enumerate
        #[arg(required = true)]
        library_id: String,

        /// Badge types to apply (default: all)
        #[arg(long, value_delimiter = ',')]
        badges: Vec<String>,
    },

    /// List candidate replacement posters for an item
    Sources {
        /// Catalog item ID
        #[arg(required = true)]
        item_id: String,
    },

    /// Replace an item's poster from a source URL, then re-badge it
    Replace {
        /// Catalog item ID
        #[arg(required = true)]
        item_id: String,

        /// Image URL to install
        #[arg(required = true)]
        url: String,
    },

    /// Revert a previously badged item to its original poster
    Revert {
        /// Catalog item ID
        #[arg(required = true)]
        item_id: String,
    },

    /// Restore every stored original over its modified copy
    RestoreAll,

    /// List recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        #[arg(required = true)]
        job_id: String,
    },

    /// Show settings in a category
    ConfigGet {
        /// Settings category
        #[arg(required = true)]
        category: String,
    },

    /// Store an API key for an enrichment service
    SetKey {
        /// Service name (omdb, tmdb, mdblist)
        #[arg(required = true)]
        service: String,

        /// The key value
        #[arg(required = true)]
        key: String,
    },

    /// Check that the catalog is reachable
    Health,

    /// Display version information
    Version,
}
