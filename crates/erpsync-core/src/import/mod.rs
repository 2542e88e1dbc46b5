//! Spreadsheet imports into the local store
//!
//! Each import takes the rows produced by [`crate::spreadsheet::read_rows`],
//! skips the header row and reports per-row problems keyed by the 1-based
//! sheet row number.

mod inventory;
mod product_variants;
mod products;
mod variants;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

pub use inventory::{import_inventory, InventoryOptions};
pub use product_variants::{import_product_variants, ProductVariantOptions};
pub use products::{import_products, ProductImportOptions, UpdateFields};
pub use variants::{import_variants, VariantOptions};

/// Outcome of a spreadsheet import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub completed: usize,
    /// Message per skipped row, keyed by sheet row number
    pub skipped: BTreeMap<usize, String>,
}

impl ImportReport {
    pub fn skip(&mut self, row: usize, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Row {row} skipped: {message}");
        self.skipped.insert(row, message);
    }

    /// Human-readable summary listing every skipped row
    pub fn message(&self) -> String {
        let mut message = format!("{} record(s) imported successfully", self.completed);
        if !self.skipped.is_empty() {
            message.push_str("\nDetails:");
            for (row, reason) in &self.skipped {
                message.push_str(&format!("\nRow {row}: {reason}"));
            }
        }
        message
    }
}

/// Column used to find the product a row refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductLookup {
    Name,
    Barcode,
    #[default]
    Code,
    Minicode,
}

impl ProductLookup {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Barcode => "barcode",
            Self::Code => "code",
            Self::Minicode => "minicode",
        }
    }
}

impl fmt::Display for ProductLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductLookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "barcode" => Ok(Self::Barcode),
            "code" | "default_code" => Ok(Self::Code),
            "minicode" => Ok(Self::Minicode),
            other => Err(Error::InvalidInput(format!(
                "unknown product lookup '{other}' (expected name, barcode, code or minicode)"
            ))),
        }
    }
}

/// Cell `index` of a row, empty when the row is short
fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", String::as_str)
}

/// Rows after the header, paired with their sheet row number
fn data_rows(rows: &[Vec<String>]) -> impl Iterator<Item = (usize, &[String])> {
    rows.iter()
        .enumerate()
        .skip(1)
        .map(|(index, row)| (index + 1, row.as_slice()))
}

/// Record a per-row failure, or hand back anything that aborts the import
fn record_failure(report: &mut ImportReport, row: usize, error: Error) -> Result<()> {
    match error {
        Error::RowFormat { message, .. } => {
            report.skip(row, message);
            Ok(())
        }
        error if error.is_recoverable() => {
            report.skip(row, error.to_string());
            Ok(())
        }
        error => Err(error),
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn parse_number(row: usize, label: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::row_format(row, format!("invalid {label} '{value}'")))
}

#[cfg(test)]
pub(crate) fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn message_lists_skipped_rows_in_order() {
        let mut report = ImportReport {
            completed: 2,
            ..ImportReport::default()
        };
        report.skip(7, "product not found");
        report.skip(3, "invalid quantity 'x'");

        assert_eq!(
            report.message(),
            "2 record(s) imported successfully\nDetails:\nRow 3: invalid quantity 'x'\nRow 7: product not found"
        );
    }

    #[test]
    fn lookup_parses_case_insensitively() {
        assert_eq!("Barcode".parse::<ProductLookup>().unwrap(), ProductLookup::Barcode);
        assert_eq!("default_code".parse::<ProductLookup>().unwrap(), ProductLookup::Code);
        assert!("sku".parse::<ProductLookup>().is_err());
    }

    #[test]
    fn data_rows_skip_the_header() {
        let rows = sheet(&[&["name"], &["A"], &["B"]]);
        let numbered: Vec<(usize, &str)> = data_rows(&rows)
            .map(|(number, row)| (number, cell(row, 0)))
            .collect();
        assert_eq!(numbered, vec![(2, "A"), (3, "B")]);
        assert_eq!(cell(&rows[1], 5), "");
    }
}
