//! erpsync-core - Core library for erpsync
//!
//! Pulls invoices, credit notes, partners, products and serial lots from a
//! remote ERP over JSON-RPC into a local `SQLite` store, and loads inventory
//! and catalog spreadsheets into the same store.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod rpc;
pub mod spreadsheet;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
