use serde::{Deserialize, Serialize};

use crate::utils::validation::total_pages;

pub fn default_page() -> i64 {
    1
}

pub fn default_limit() -> i64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        Self {
            current_page: page,
            total_pages: total_pages(total_items, limit),
            total_items,
            items_per_page: limit,
        }
    }
}

// Envoltorio {data, pagination} de los listados
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self { data, pagination }
    }
}

// Respuesta de las escrituras sobre partners y su flota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub partner_id: String,
    pub message: String,
}

impl MessageResponse {
    pub fn new(partner_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            partner_id: partner_id.into(),
            message: message.into(),
        }
    }
}
