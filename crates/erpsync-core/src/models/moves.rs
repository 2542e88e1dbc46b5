//! Accounting move, electronic document request and attachment models

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), " '{}'"), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    OutInvoice,
    OutRefund,
}

string_enum!(MoveType {
    OutInvoice => "out_invoice",
    OutRefund => "out_refund",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    #[default]
    Draft,
    Posted,
    Cancel,
}

string_enum!(MoveState {
    Draft => "draft",
    Posted => "posted",
    Cancel => "cancel",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    NotPaid,
    Paid,
}

string_enum!(PaymentState {
    NotPaid => "not_paid",
    Paid => "paid",
});

/// A document line about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMoveLine {
    pub product_id: Option<i64>,
    pub uom_id: i64,
    pub name: Option<String>,
    pub quantity: f64,
    pub price_unit: f64,
    /// Percentage
    pub discount: f64,
    pub tax_ids: Vec<i64>,
}

impl NewMoveLine {
    pub fn subtotal(&self) -> f64 {
        self.quantity * self.price_unit * (1.0 - self.discount / 100.0)
    }
}

/// Values for an invoice or credit note about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMove {
    pub name: String,
    pub move_type: MoveType,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_date_due: Option<NaiveDate>,
    pub date: Option<NaiveDate>,
    pub journal_id: i64,
    pub partner_id: Option<i64>,
    pub currency_id: i64,
    pub payment_term_id: Option<i64>,
    pub shop_id: i64,
    pub document_type_code: Option<String>,
    pub datetime_invoice: Option<NaiveDateTime>,
    pub state: MoveState,
    pub reversal_type_code: Option<String>,
    pub origin_move_id: Option<i64>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    /// Remote id this move was imported from
    pub import_id: i64,
    pub lines: Vec<NewMoveLine>,
}

impl NewMove {
    pub fn amount_total(&self) -> f64 {
        self.lines.iter().map(NewMoveLine::subtotal).sum()
    }
}

/// An invoice or credit note stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub id: i64,
    pub name: String,
    pub move_type: MoveType,
    pub invoice_date: Option<NaiveDate>,
    pub journal_id: i64,
    pub partner_id: Option<i64>,
    pub currency_id: i64,
    pub shop_id: i64,
    pub state: MoveState,
    pub payment_state: PaymentState,
    pub amount_total: f64,
    pub amount_residual: f64,
    pub import_id: Option<i64>,
    pub edi_request_id: Option<i64>,
}

/// Electronic document payload carried from the remote record to post-processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdiDocument {
    /// Base64 XML of the signed document
    pub xml: Option<String>,
    pub xml_filename: Option<String>,
    /// Base64 receipt returned by the tax authority
    pub cdr: Option<String>,
    pub cdr_filename: Option<String>,
    pub digest_value: Option<String>,
    pub voided: bool,
}

/// Electronic document request attached to a posted move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdiRequest {
    pub id: i64,
    pub move_id: i64,
    pub ose_accepted: bool,
    pub sunat_accepted: bool,
    pub sunat_canceled: bool,
    pub xml_generated: bool,
    pub xml_attachment_id: Option<i64>,
    pub cdr_attachment_id: Option<i64>,
    pub digest_value: Option<String>,
}

/// Binary attachment stored as base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub res_model: String,
    pub res_id: i64,
    pub datas: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_enums_round_trip() {
        assert_eq!("out_refund".parse::<MoveType>(), Ok(MoveType::OutRefund));
        assert_eq!(MoveState::Cancel.as_str(), "cancel");
        assert_eq!("paid".parse::<PaymentState>(), Ok(PaymentState::Paid));
        assert!("open".parse::<MoveState>().is_err());
    }

    #[test]
    fn line_subtotal_applies_discount() {
        let line = NewMoveLine {
            product_id: None,
            uom_id: 1,
            name: None,
            quantity: 2.0,
            price_unit: 50.0,
            discount: 10.0,
            tax_ids: Vec::new(),
        };
        assert!((line.subtotal() - 90.0).abs() < f64::EPSILON);
    }
}
