//! Controllers de partners y flota
//!
//! Reglas de negocio de las operaciones CRUD: unicidad, pertenencia del
//! vehículo al partner y parches parciales.

pub mod partner_controller;
pub mod vehicle_controller;

pub use partner_controller::PartnerController;
pub use vehicle_controller::VehicleController;
