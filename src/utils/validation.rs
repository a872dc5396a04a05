//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! y conversión de filtros de query string.

use std::str::FromStr;

use validator::ValidationError;

use super::errors::{bad_request_error, AppResult};

/// Validar que un string no esté vacío
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Convertir un filtro de estado opcional, rechazando valores desconocidos
pub fn parse_status_filter<T: FromStr>(
    value: Option<&str>,
    allowed: &[&str],
) -> AppResult<Option<T>> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            bad_request_error(format!(
                "Invalid status filter. Allowed values: {}",
                allowed.join(", ")
            ))
        }),
    }
}

/// Offset SQL de una página (1-based); satura en `i64::MAX`
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).max(0).saturating_mul(limit.max(0))
}

/// Número de páginas necesarias para `total` elementos
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}
