use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use erpsync_core::import::{ProductLookup, UpdateFields};
use erpsync_core::models::{RecordKind, SourceVersion};

#[derive(Parser)]
#[command(name = "erpsync")]
#[command(about = "Pull ERP records into a local store and import inventory spreadsheets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote connection to use instead of the active one
    #[arg(long, global = true, value_name = "NAME")]
    pub connection: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage remote connections and run defaults
    Connection {
        #[command(subcommand)]
        command: ConnectionCommands,
    },
    /// Load local reference data
    Reference {
        #[command(subcommand)]
        command: ReferenceCommands,
    },
    /// Import records from the remote instance
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Import a spreadsheet into the local store
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Inspect the sync log
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
}

#[derive(Subcommand)]
pub enum ConnectionCommands {
    /// Add or replace a connection
    Add {
        /// Connection name
        name: String,
        /// Host name or base URL
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 8069)]
        port: u16,
        /// Remote database name
        #[arg(long)]
        database: String,
        #[arg(long)]
        user: String,
        /// Password (read from ERPSYNC_PASSWORD when omitted)
        #[arg(long, env = "ERPSYNC_PASSWORD", hide_env_values = true)]
        password: String,
        /// Major version of the remote instance (11, 12, 13, 17)
        #[arg(long, default_value_t = 11)]
        version: u32,
        /// Keep current active connection instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// List saved connections
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a saved connection
    Remove { name: String },
    /// Check a connection step by step
    Test {
        /// Connection name (active connection when omitted)
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a connection the active one
    Use { name: String },
    /// Show or update the persisted run defaults
    Settings(SettingsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Remote ids fetched per round trip
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,
    /// Timeout of a single remote call, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Local tax applied to imported lines and products
    #[arg(long, value_name = "ID")]
    pub default_tax: Option<i64>,
    /// Remote company filter
    #[arg(long, value_name = "ID")]
    pub company: Option<i64>,
    /// Company stamped on local records
    #[arg(long, value_name = "ID")]
    pub local_company: Option<i64>,
    /// Stock location for lots and quants
    #[arg(long, value_name = "ID")]
    pub location: Option<i64>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ReferenceCommands {
    /// Load currencies, journals, geography and other lookups from a JSON file
    Load {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Import customer invoices
    Invoice(SyncArgs),
    /// Import credit notes
    CreditNote(SyncArgs),
    /// Import receipts issued from sale orders (v11 instances)
    SaleOrder(SyncArgs),
    /// Import partners
    Partner(SyncArgs),
    /// Import product templates with categories and images
    Product(SyncArgs),
    /// Import shop products with website categories and brand/size variants
    EcommerceProduct(SyncArgs),
    /// Import serial lots
    Lot(SyncArgs),
    /// Refresh tracking, company and website categories of imported products
    RefreshProducts(SyncArgs),
    /// Post and settle imported documents left unfinished by a failed run
    Repair {
        /// Only repair this document type
        #[arg(long, value_enum)]
        documents: Option<DocumentKind>,
        #[command(flatten)]
        args: SyncArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// First issue date (defaults to the first day of the current month)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: Option<NaiveDate>,
    /// Last issue date (defaults to the last day of the current month)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: Option<NaiveDate>,
    /// Substring filter on the document number
    #[arg(long, value_name = "TEXT")]
    pub name: Option<String>,
    /// Cap on the number of remote records searched
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Remote ids fetched per round trip
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,
    /// First remote id (product runs)
    #[arg(long, value_name = "ID")]
    pub start_id: Option<i64>,
    /// Last remote id (product runs)
    #[arg(long, value_name = "ID")]
    pub end_id: Option<i64>,
    /// Remote company filter
    #[arg(long, value_name = "ID")]
    pub company: Option<i64>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DocumentKind {
    Invoice,
    CreditNote,
    SaleOrder,
}

impl DocumentKind {
    pub const fn record_kind(self) -> RecordKind {
        match self {
            Self::Invoice => RecordKind::Invoice,
            Self::CreditNote => RecordKind::CreditNote,
            Self::SaleOrder => RecordKind::SaleOrder,
        }
    }

    /// Document kinds a remote instance of `version` issues
    pub fn for_version(version: SourceVersion) -> Vec<Self> {
        match version {
            SourceVersion::V11 => vec![Self::Invoice, Self::CreditNote, Self::SaleOrder],
            SourceVersion::V13 => vec![Self::Invoice, Self::CreditNote],
        }
    }
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Set on-hand quantities from a stock count sheet
    Inventory {
        #[command(flatten)]
        file: WorkbookArgs,
        /// Column used to find products: name, barcode, code or minicode
        #[arg(long, default_value = "code")]
        lookup: ProductLookup,
        /// Stock location receiving the counts
        #[arg(long, value_name = "ID")]
        location: i64,
        #[arg(long, value_name = "ID")]
        company: Option<i64>,
        /// Do not create serial lots for serial-tracked products
        #[arg(long)]
        no_serials: bool,
    },
    /// Set variant quantities from a sheet keyed by attribute value
    Variants {
        #[command(flatten)]
        file: WorkbookArgs,
        #[arg(long, value_name = "ID")]
        location: i64,
        #[arg(long, value_name = "ID")]
        company: Option<i64>,
    },
    /// Create templates and their variants from an attribute sheet
    ProductVariants {
        #[command(flatten)]
        file: WorkbookArgs,
        #[arg(long, value_name = "ID")]
        company: Option<i64>,
    },
    /// Create or update products from a catalog sheet
    Products {
        #[command(flatten)]
        file: WorkbookArgs,
        /// Column used to find products: name, code or minicode
        #[arg(long, default_value = "code")]
        lookup: ProductLookup,
        /// Fields refreshed on existing products, comma separated
        #[arg(long, value_enum, num_args = 0.., value_delimiter = ',')]
        update: Option<Vec<UpdateField>>,
        #[arg(long, value_name = "ID")]
        company: Option<i64>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct WorkbookArgs {
    /// Workbook path (.xlsx)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
    /// The file holds the workbook as base64 text
    #[arg(long)]
    pub base64: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum UpdateField {
    Name,
    Cost,
    Price,
    Category,
    Model,
    Minicode,
    Technology,
    DefaultCode,
    DescriptionSale,
    Tracking,
}

impl UpdateField {
    pub fn collect(fields: &[Self]) -> UpdateFields {
        let mut selected = UpdateFields::default();
        for field in fields {
            match field {
                Self::Name => selected.name = true,
                Self::Cost => selected.cost = true,
                Self::Price => selected.price = true,
                Self::Category => selected.category = true,
                Self::Model => selected.model = true,
                Self::Minicode => selected.minicode = true,
                Self::Technology => selected.technology = true,
                Self::DefaultCode => selected.default_code = true,
                Self::DescriptionSale => selected.description_sale = true,
                Self::Tracking => selected.tracking = true,
            }
        }
        selected
    }
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Show recent sync log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only entries of one run
        #[arg(long, value_name = "RUN_ID")]
        run: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
