//! Local reference data rows

use serde::{Deserialize, Serialize};

/// Accounting journal, matched by the document-number prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub company_id: Option<i64>,
    /// Electronic document type (01 invoice, 07 credit note, ...)
    pub document_type_code: Option<String>,
}

/// Any reference row keyed by name, optionally with a code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
}
