//! # EMS Core
//!
//! Core business logic for the emergency incident dispatch coordinator.
//!
//! This crate contains pure domain operations:
//! - Incident intake and lookup (`registry::incident`)
//! - Fleet records, manual status toggles, position ingestion
//!   (`registry::vehicle`, `location`)
//! - The incident/vehicle lifecycle state machine (`dispatch`)
//! - ER handoff acknowledgments (`handoff`)
//!
//! **No API concerns**: authentication, HTTP servers, and wire formats
//! belong in `api-rest` and `api-shared`. Every operation takes an explicit
//! [`Actor`], so the core runs in tests without any framework in front of
//! it.

pub mod actor;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handoff;
pub mod incident;
pub mod location;
pub mod registry;
pub mod vehicle;

pub use actor::{Actor, Role};
pub use config::CoreConfig;
pub use dispatch::DispatchCoordinator;
pub use error::{DispatchError, DispatchResult, Entity};
pub use handoff::{ErHandoff, HandoffTracker};
pub use incident::{Incident, IncidentReport, IncidentStatus, Priority};
pub use location::{LocationStore, PositionReport};
pub use registry::{IncidentFilter, IncidentRegistry, VehicleFilter, VehicleRegistry};
pub use vehicle::{LocationSample, Vehicle, VehicleRegistration, VehicleStatus, VehicleType};

use std::sync::Arc;

/// The wired-up dispatch core: registries, coordinator, location store, and
/// handoff tracker sharing one configuration.
///
/// API servers, the CLI, and tests all construct one of these and call the
/// parts directly.
#[derive(Debug)]
pub struct DispatchSystem {
    pub cfg: Arc<CoreConfig>,
    pub incidents: Arc<IncidentRegistry>,
    pub vehicles: Arc<VehicleRegistry>,
    pub coordinator: DispatchCoordinator,
    pub locations: LocationStore,
    pub handoffs: HandoffTracker,
}

impl DispatchSystem {
    pub fn new(cfg: CoreConfig) -> Self {
        let cfg = Arc::new(cfg);
        let incidents = Arc::new(IncidentRegistry::new(cfg.clone()));
        let vehicles = Arc::new(VehicleRegistry::new());
        let coordinator = DispatchCoordinator::new(incidents.clone(), vehicles.clone());
        let locations = LocationStore::new(cfg.clone(), vehicles.clone());
        let handoffs = HandoffTracker::new(incidents.clone());

        Self {
            cfg,
            incidents,
            vehicles,
            coordinator,
            locations,
            handoffs,
        }
    }

    /// Incidents currently inbound to the hospital, the ER arrivals board.
    pub fn inbound(&self) -> Vec<Incident> {
        self.incidents.list(&IncidentFilter {
            statuses: vec![IncidentStatus::Transporting],
            ..IncidentFilter::default()
        })
    }
}

impl Default for DispatchSystem {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}
