use clap::{Parser, Subcommand, ValueEnum};
use shared::{ItemId, LibraryScope, SortKey, SortOrder};

#[derive(Parser)]
#[command(name = "mediashelf")]
#[command(author, version, about = "Browse and maintain a media library server")]
pub struct Cli {
    /// Server base URL (overrides MEDIASHELF_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List library items
    List {
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,

        #[arg(long, value_enum)]
        sort: Option<Sort>,

        #[arg(long, value_enum)]
        order: Option<Order>,

        /// Filter by title
        #[arg(short, long)]
        search: Option<String>,

        /// 1-indexed page, requires --limit
        #[arg(long, requires = "limit")]
        page: Option<u32>,

        /// Items per page
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show one item with its metadata
    Show {
        id: ItemId,
    },

    /// Re-resolve metadata for one or more items
    Refresh {
        #[arg(required = true)]
        ids: Vec<ItemId>,
    },

    /// Search provider matches for an item, and optionally apply one
    Identify {
        id: ItemId,

        /// Apply the Nth candidate (1-indexed)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        pick: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Scope {
    All,
    Movies,
    Tv,
}

impl From<Scope> for LibraryScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::All => LibraryScope::All,
            Scope::Movies => LibraryScope::Movies,
            Scope::Tv => LibraryScope::Tv,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Sort {
    Title,
    Year,
    Rating,
    Added,
}

impl From<Sort> for SortKey {
    fn from(sort: Sort) -> Self {
        match sort {
            Sort::Title => SortKey::Title,
            Sort::Year => SortKey::Year,
            Sort::Rating => SortKey::Rating,
            Sort::Added => SortKey::Added,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}
