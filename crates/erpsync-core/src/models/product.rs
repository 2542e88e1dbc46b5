//! Product model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stock behaviour of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    Consu,
    Service,
    Product,
}

impl ProductType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consu => "consu",
            Self::Service => "service",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consu" => Ok(Self::Consu),
            "service" => Ok(Self::Service),
            "product" => Ok(Self::Product),
            other => Err(format!("unknown product type '{other}'")),
        }
    }
}

/// Serial or lot traceability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracking {
    #[default]
    None,
    Serial,
    Lot,
}

impl Tracking {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Serial => "serial",
            Self::Lot => "lot",
        }
    }
}

impl fmt::Display for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tracking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "serial" => Ok(Self::Serial),
            "lot" => Ok(Self::Lot),
            other => Err(format!("unknown tracking '{other}'")),
        }
    }
}

/// Values for a product about to be created locally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub default_code: Option<String>,
    pub barcode: Option<String>,
    pub minicode: Option<String>,
    pub list_price: f64,
    pub standard_price: f64,
    pub detailed_type: ProductType,
    pub tracking: Tracking,
    pub categ_id: Option<i64>,
    pub company_id: Option<i64>,
    pub description_sale: Option<String>,
    pub model: Option<String>,
    pub technology: Option<String>,
    /// Legacy article number
    pub id_articulo: Option<String>,
    pub is_published: bool,
    /// Template this row is a variant of
    pub template_id: Option<i64>,
    pub tax_ids: Vec<i64>,
    /// Remote id this product was imported from
    pub import_id: Option<i64>,
}

impl NewProduct {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A product stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub default_code: Option<String>,
    pub barcode: Option<String>,
    pub minicode: Option<String>,
    pub list_price: f64,
    pub standard_price: f64,
    pub detailed_type: ProductType,
    pub tracking: Tracking,
    pub categ_id: Option<i64>,
    pub company_id: Option<i64>,
    pub description_sale: Option<String>,
    pub model: Option<String>,
    pub technology: Option<String>,
    pub id_articulo: Option<String>,
    pub is_published: bool,
    pub template_id: Option<i64>,
    pub import_id: Option<i64>,
}

/// Partial product update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub default_code: Option<String>,
    pub barcode: Option<String>,
    pub minicode: Option<String>,
    pub id_articulo: Option<String>,
    pub list_price: Option<f64>,
    pub standard_price: Option<f64>,
    pub detailed_type: Option<ProductType>,
    pub tracking: Option<Tracking>,
    pub categ_id: Option<i64>,
    pub company_id: Option<i64>,
    pub description_sale: Option<String>,
    pub model: Option<String>,
    /// `Some(None)` clears the column
    pub technology: Option<Option<String>>,
}

impl ProductUpdate {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.default_code.is_none()
            && self.barcode.is_none()
            && self.minicode.is_none()
            && self.id_articulo.is_none()
            && self.list_price.is_none()
            && self.standard_price.is_none()
            && self.detailed_type.is_none()
            && self.tracking.is_none()
            && self.categ_id.is_none()
            && self.company_id.is_none()
            && self.description_sale.is_none()
            && self.model.is_none()
            && self.technology.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_remote_values() {
        assert_eq!("product".parse::<ProductType>(), Ok(ProductType::Product));
        assert_eq!("serial".parse::<Tracking>(), Ok(Tracking::Serial));
        assert!("kit".parse::<ProductType>().is_err());
    }

    #[test]
    fn default_update_is_empty() {
        assert!(ProductUpdate::default().is_empty());
        let update = ProductUpdate {
            technology: Some(None),
            ..ProductUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
