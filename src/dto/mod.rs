//! DTOs de la API
//!
//! Formas JSON de requests y responses (camelCase hacia el cliente).

pub mod booking_dto;
pub mod common_dto;
pub mod partner_dto;
pub mod vehicle_dto;

pub use booking_dto::*;
pub use common_dto::*;
pub use partner_dto::*;
pub use vehicle_dto::*;
