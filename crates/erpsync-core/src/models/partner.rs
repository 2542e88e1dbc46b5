//! Partner model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Individual or organization, derived from the tax id length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    Person,
    Company,
}

impl CompanyType {
    /// Tax ids of eight characters or fewer belong to individuals.
    ///
    /// A missing tax id classifies as an organization.
    pub fn from_vat(vat: Option<&str>) -> Self {
        match vat.map(str::trim) {
            Some(vat) if !vat.is_empty() && vat.chars().count() <= 8 => Self::Person,
            _ => Self::Company,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
        }
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(Self::Person),
            "company" => Ok(Self::Company),
            other => Err(format!("unknown company type '{other}'")),
        }
    }
}

/// Values for a partner about to be created locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPartner {
    pub name: String,
    pub vat: Option<String>,
    pub street: Option<String>,
    pub zip: Option<String>,
    pub company_type: CompanyType,
    pub identification_type_id: Option<i64>,
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    /// Remote id this partner was imported from
    pub import_id: Option<i64>,
}

impl NewPartner {
    pub fn new(name: impl Into<String>, vat: Option<String>) -> Self {
        let company_type = CompanyType::from_vat(vat.as_deref());
        Self {
            name: name.into(),
            vat,
            street: None,
            zip: None,
            company_type,
            identification_type_id: None,
            country_id: None,
            state_id: None,
            city_id: None,
            district_id: None,
            import_id: None,
        }
    }
}

/// A partner stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub vat: Option<String>,
    pub street: Option<String>,
    pub zip: Option<String>,
    pub company_type: CompanyType,
    pub identification_type_id: Option<i64>,
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub import_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_vat_is_person() {
        assert_eq!(CompanyType::from_vat(Some("45678912")), CompanyType::Person);
        assert_eq!(CompanyType::from_vat(Some("1234")), CompanyType::Person);
    }

    #[test]
    fn long_or_missing_vat_is_company() {
        assert_eq!(
            CompanyType::from_vat(Some("20123456789")),
            CompanyType::Company
        );
        assert_eq!(CompanyType::from_vat(Some("123456789")), CompanyType::Company);
        assert_eq!(CompanyType::from_vat(Some("  ")), CompanyType::Company);
        assert_eq!(CompanyType::from_vat(None), CompanyType::Company);
    }

    #[test]
    fn new_partner_derives_company_type() {
        let partner = NewPartner::new("JUAN PEREZ", Some("45678912".into()));
        assert_eq!(partner.company_type, CompanyType::Person);
    }
}
