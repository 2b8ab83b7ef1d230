//! Record registries: the only mutable shared state in the core.

pub mod incident;
pub(crate) mod store;
pub mod vehicle;

pub use incident::{IncidentFilter, IncidentRegistry, TreatmentInput, VitalInput};
pub use vehicle::{VehicleFilter, VehicleRegistry};
