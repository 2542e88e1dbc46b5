//! Serial lots and stock quantities

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Canonical serial number: spaces removed, trimmed, NFC-normalized
pub fn normalize_serial(text: &str) -> String {
    text.replace(' ', "").trim().nfc().collect()
}

/// Values for a serial lot about to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLot {
    pub name: String,
    pub product_id: i64,
    pub company_id: Option<i64>,
    pub location_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub name: String,
    pub product_id: i64,
    pub company_id: Option<i64>,
    pub location_id: Option<i64>,
}

/// On-hand quantity of a product (and lot) at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuant {
    pub id: i64,
    pub product_id: i64,
    pub location_id: i64,
    pub lot_id: Option<i64>,
    pub quantity: f64,
    pub reserved_quantity: f64,
    pub company_id: Option<i64>,
    pub inventory_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_loses_spaces() {
        assert_eq!(normalize_serial("  SN 123 456 "), "SN123456");
    }

    #[test]
    fn serial_is_nfc() {
        let decomposed = "Ne\u{0301}ctar";
        assert_eq!(normalize_serial(decomposed), "N\u{e9}ctar");
    }
}
