//! Local store for erpsync

mod attachments;
mod catalog;
mod connection;
mod migrations;
mod moves;
mod partners;
mod products;
mod reference;
mod stock;
mod sync_log;

pub use attachments::{AttachmentRepository, SqliteAttachmentRepository};
pub use catalog::{CatalogRepository, SqliteCatalogRepository};
pub use connection::Database;
pub use moves::{MoveRepository, SqliteMoveRepository};
pub use partners::{PartnerRepository, SqlitePartnerRepository};
pub use products::{ProductRepository, SqliteProductRepository};
pub use reference::{
    load_reference_data, CategorySeed, CitySeed, CodeSeed, CountrySeed, JournalSeed,
    ReferenceData, ReferenceRepository, RefTable, SqliteReferenceRepository, StateSeed,
};
pub use stock::{SqliteStockRepository, StockRepository};
pub use sync_log::{SqliteSyncLogRepository, SyncLogRepository};
