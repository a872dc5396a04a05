//! Modelo de Partner
//!
//! Este módulo contiene el struct Partner y sus variantes para CRUD operations.
//! Mapea al schema PostgreSQL con primary key 'partner_id'.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::StatusParseError;

/// Estado del partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    Active,
    Inactive,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Active => "active",
            PartnerStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnerStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PartnerStatus::Active),
            "inactive" => Ok(PartnerStatus::Inactive),
            other => Err(StatusParseError::new("partner", other)),
        }
    }
}

impl TryFrom<String> for PartnerStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Partner principal - mapea a la tabla partners
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Partner {
    pub partner_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    pub fn new(name: String, phone: String, email: String, address: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            partner_id: super::generate_id("partner"),
            name,
            phone,
            email,
            address,
            status: PartnerStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cambios parciales sobre un partner: solo se aplican los campos presentes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<PartnerStatus>,
}

impl PartnerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.status.is_none()
    }

    /// Aplicar sobre una copia en memoria
    pub fn apply_to(&self, partner: &mut Partner) {
        if let Some(name) = &self.name {
            partner.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            partner.phone = phone.clone();
        }
        if let Some(email) = &self.email {
            partner.email = email.clone();
        }
        if let Some(address) = &self.address {
            partner.address = Some(address.clone());
        }
        if let Some(status) = self.status {
            partner.status = status;
        }
    }
}

/// Filtros para el listado de partners
#[derive(Debug, Clone, Default)]
pub struct PartnerFilter {
    pub status: Option<PartnerStatus>,
    /// Búsqueda por subcadena en la dirección
    pub location: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl PartnerFilter {
    pub fn matches(&self, partner: &Partner) -> bool {
        let status_ok = self.status.map_or(true, |s| partner.status == s);
        let location_ok = self.location.as_deref().map_or(true, |needle| {
            partner
                .address
                .as_deref()
                .map_or(false, |address| address.contains(needle))
        });
        status_ok && location_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut partner = Partner::new(
            "City Cabs".to_string(),
            "+91 9800000001".to_string(),
            "ops@citycabs.in".to_string(),
            Some("MG Road, Bengaluru".to_string()),
        );
        let patch = PartnerPatch {
            email: Some("fleet@citycabs.in".to_string()),
            status: Some(PartnerStatus::Inactive),
            ..Default::default()
        };

        assert!(!patch.is_empty());
        patch.apply_to(&mut partner);

        assert_eq!(partner.name, "City Cabs");
        assert_eq!(partner.email, "fleet@citycabs.in");
        assert_eq!(partner.phone, "+91 9800000001");
        assert_eq!(partner.status, PartnerStatus::Inactive);
        assert!(PartnerPatch::default().is_empty());
    }

    #[test]
    fn test_filter_matches_location_substring() {
        let partner = Partner::new(
            "City Cabs".to_string(),
            "+91 9800000001".to_string(),
            "ops@citycabs.in".to_string(),
            Some("MG Road, Bengaluru".to_string()),
        );

        let by_city = PartnerFilter {
            location: Some("Bengaluru".to_string()),
            ..Default::default()
        };
        let by_status = PartnerFilter {
            status: Some(PartnerStatus::Inactive),
            ..Default::default()
        };

        assert!(by_city.matches(&partner));
        assert!(!by_status.matches(&partner));
        assert!(partner.partner_id.starts_with("partner_"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<PartnerStatus>().unwrap(), PartnerStatus::Active);
        assert!("suspended".parse::<PartnerStatus>().is_err());
    }
}
