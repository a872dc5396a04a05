//! Middleware HTTP
//!
//! CORS y el tratamiento de errores de las capas de `tower`.

pub mod cors;
pub mod errors;

pub use cors::cors_layer;
pub use errors::handle_middleware_error;
