//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema
//! PostgreSQL y los tipos de estado cerrados del dominio.

pub mod booking;
pub mod fare;
pub mod partner;
pub mod vehicle;

pub use booking::*;
pub use fare::*;
pub use partner::*;
pub use vehicle::*;

use thiserror::Error;
use uuid::Uuid;

/// Valor de estado desconocido leído de la base de datos o del cliente
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown {kind} status '{value}'")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

impl StatusParseError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Genera ids del tipo `booking_3f2a9c1d4e5b`
pub fn generate_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..12])
}
