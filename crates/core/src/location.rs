//! Position ingestion and the ETA heuristic.
//!
//! Location pushes are cheap and frequent, and deliberately decoupled from
//! the heavier dispatch state: a push can never change a status or fail a
//! response. Staleness is advisory: the dispatch board greys a marker out,
//! nothing blocks.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::actor::{Actor, Role};
use crate::config::CoreConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::incident::Incident;
use crate::registry::VehicleRegistry;
use crate::vehicle::{LocationSample, Vehicle};

/// A vehicle together with the advisory staleness of its last position.
#[derive(Clone, Debug)]
pub struct PositionReport {
    pub vehicle: Vehicle,
    pub stale: bool,
}

/// Ingests driver-app position pushes and derives advisory signals.
#[derive(Debug)]
pub struct LocationStore {
    cfg: Arc<CoreConfig>,
    vehicles: Arc<VehicleRegistry>,
}

impl LocationStore {
    pub fn new(cfg: Arc<CoreConfig>, vehicles: Arc<VehicleRegistry>) -> Self {
        Self { cfg, vehicles }
    }

    /// Record a position sample for a vehicle.
    ///
    /// Drivers and paramedics may push only for their own vehicle; dispatch
    /// staff for any. Out-of-order samples are dropped (with a warning) by
    /// the registry, so the returned vehicle always carries the newest known
    /// position.
    ///
    /// # Errors
    ///
    /// `Forbidden` for a crew member pushing for another vehicle, `NotFound`
    /// for unknown vehicles.
    pub fn push(
        &self,
        actor: &Actor,
        vehicle_id: &str,
        sample: LocationSample,
    ) -> DispatchResult<PositionReport> {
        match actor.role {
            Role::Admin | Role::Dispatcher | Role::Driver | Role::Paramedic => {
                actor.require_vehicle_access(vehicle_id, "push a location")?;
            }
            _ => {
                return Err(DispatchError::Forbidden {
                    role: actor.role.to_string(),
                    action: "push a location".into(),
                });
            }
        }

        let vehicle = self.vehicles.update_location(vehicle_id, sample)?;
        let stale = self.is_stale(&vehicle, Utc::now());
        Ok(PositionReport { vehicle, stale })
    }

    /// Whether the vehicle's last position is older than the configured
    /// threshold (or missing entirely).
    pub fn is_stale(&self, vehicle: &Vehicle, now: DateTime<Utc>) -> bool {
        match &vehicle.current_location {
            Some(sample) => now - sample.recorded_at > self.cfg.stale_after(),
            None => true,
        }
    }

    /// Remaining transport time for an incident that is on its way in.
    ///
    /// This is `max(0, assumed_duration - elapsed)` against a fixed assumed
    /// transport duration. A placeholder heuristic for the arrivals board,
    /// not a routing computation. Returns `None` before transport starts.
    pub fn estimate_arrival(&self, incident: &Incident, now: DateTime<Utc>) -> Option<Duration> {
        let started = incident.transport_started_at?;
        let remaining = self.cfg.assumed_transport() - (now - started);
        Some(remaining.max(Duration::zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{IncidentReport, Priority};
    use crate::registry::IncidentRegistry;
    use crate::vehicle::{VehicleRegistration, VehicleType};

    fn setup() -> (Arc<CoreConfig>, Arc<VehicleRegistry>, LocationStore) {
        let cfg = Arc::new(CoreConfig::default());
        let vehicles = Arc::new(VehicleRegistry::new());
        let store = LocationStore::new(cfg.clone(), vehicles.clone());
        vehicles
            .register(
                &Actor::new("s-disp", Role::Dispatcher),
                VehicleRegistration {
                    id: "AMB-01".into(),
                    call_sign: "Rescue 1".into(),
                    vehicle_number: "KA-01-7788".into(),
                    base_station: "Central".into(),
                    vehicle_type: VehicleType::BasicLifeSupport,
                    crew: vec![],
                },
            )
            .unwrap();
        (cfg, vehicles, store)
    }

    fn sample(age_secs: i64) -> LocationSample {
        LocationSample {
            latitude: 12.97,
            longitude: 77.59,
            address: None,
            recorded_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn fresh_push_is_not_stale() {
        let (_, _, store) = setup();
        let driver = Actor::new("s-drv", Role::Driver).with_vehicle("AMB-01");
        let report = store.push(&driver, "AMB-01", sample(5)).expect("push");
        assert!(!report.stale);
    }

    #[test]
    fn old_or_missing_positions_are_stale() {
        let (_, vehicles, store) = setup();
        let vehicle = vehicles.get("AMB-01").unwrap();
        assert!(store.is_stale(&vehicle, Utc::now()));

        let dispatcher = Actor::new("s-disp", Role::Dispatcher);
        let report = store.push(&dispatcher, "AMB-01", sample(600)).expect("push");
        assert!(report.stale);
    }

    #[test]
    fn crew_cannot_push_for_other_vehicles() {
        let (_, _, store) = setup();
        let driver = Actor::new("s-drv", Role::Driver).with_vehicle("AMB-02");
        let err = store.push(&driver, "AMB-01", sample(1));
        assert!(matches!(err, Err(DispatchError::Forbidden { .. })));

        let nurse = Actor::new("s-n", Role::Nurse);
        let err = store.push(&nurse, "AMB-01", sample(1));
        assert!(matches!(err, Err(DispatchError::Forbidden { .. })));
    }

    #[test]
    fn eta_clamps_at_zero_and_needs_transport() {
        let (cfg, _, store) = setup();
        let incidents = IncidentRegistry::new(cfg.clone());
        let mut incident = incidents
            .report(
                &Actor::new("s-r", Role::Receptionist),
                IncidentReport {
                    priority: Some(Priority::High),
                    caller_name: "A".into(),
                    caller_phone: "555".into(),
                    patient_condition: "fracture".into(),
                    address: "5th Cross".into(),
                    ..IncidentReport::default()
                },
            )
            .unwrap();

        let now = Utc::now();
        assert!(store.estimate_arrival(&incident, now).is_none());

        incident.transport_started_at = Some(now - Duration::seconds(60));
        let eta = store.estimate_arrival(&incident, now).expect("eta");
        assert_eq!(eta, cfg.assumed_transport() - Duration::seconds(60));

        incident.transport_started_at = Some(now - Duration::hours(3));
        let eta = store.estimate_arrival(&incident, now).expect("eta");
        assert_eq!(eta, Duration::zero());
    }
}
