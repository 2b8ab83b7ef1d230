//! Vehicle registry: fleet records, manual status toggles, and position
//! ingestion.

use crate::actor::{Actor, FLEET_ROLES};
use crate::error::{DispatchError, DispatchResult, Entity};
use crate::registry::store::Store;
use crate::vehicle::{LocationSample, Vehicle, VehicleRegistration, VehicleStatus};

/// Filter for vehicle listings.
#[derive(Clone, Debug, Default)]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
    pub base_station: Option<String>,
}

impl VehicleFilter {
    fn matches(&self, vehicle: &Vehicle) -> bool {
        if let Some(status) = self.status {
            if vehicle.status != status {
                return false;
            }
        }
        if let Some(base) = &self.base_station {
            if !vehicle.base_station.eq_ignore_ascii_case(base) {
                return false;
            }
        }
        true
    }
}

/// Stores vehicle records.
///
/// The four active-response statuses and the incident binding are written
/// only by the dispatch coordinator; everything else (registration, manual
/// availability toggles, location pushes) lives here.
#[derive(Debug)]
pub struct VehicleRegistry {
    store: Store<Vehicle>,
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self {
            store: Store::new(Entity::Vehicle),
        }
    }

    /// Register a new vehicle (fleet administration).
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-fleet roles, `Validation` for blank identity
    /// fields, `Conflict` when the id is already registered.
    pub fn register(
        &self,
        actor: &Actor,
        registration: VehicleRegistration,
    ) -> DispatchResult<Vehicle> {
        actor.require(FLEET_ROLES, "register a vehicle")?;
        let vehicle = registration.into_vehicle()?;
        let id = vehicle.id.clone();
        if !self.store.insert_if_vacant(&id, vehicle.clone()) {
            return Err(DispatchError::Conflict(format!(
                "vehicle id '{id}' is already registered"
            )));
        }
        tracing::info!(vehicle = %id, call_sign = %vehicle.call_sign, "vehicle registered");
        Ok(vehicle)
    }

    /// Fetch a vehicle by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown.
    pub fn get(&self, id: &str) -> DispatchResult<Vehicle> {
        self.store.get(id)
    }

    /// List vehicles matching `filter`, ordered by call sign.
    pub fn list(&self, filter: &VehicleFilter) -> Vec<Vehicle> {
        let mut vehicles = self.store.list(|vehicle| filter.matches(vehicle));
        vehicles.sort_by(|a, b| a.call_sign.cmp(&b.call_sign));
        vehicles
    }

    /// Overwrite the vehicle's last-known position with a newer sample.
    ///
    /// Last-write-wins by sample timestamp, not arrival order: a sample older
    /// than the stored one is dropped with a warning so network reordering
    /// never rewinds a vehicle's position. Never a hard failure.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the vehicle is unknown.
    pub fn update_location(&self, id: &str, sample: LocationSample) -> DispatchResult<Vehicle> {
        self.store.update_if(
            id,
            |_| Ok(()),
            |vehicle| {
                if let Some(current) = &vehicle.current_location {
                    if sample.recorded_at < current.recorded_at {
                        tracing::warn!(
                            vehicle = %vehicle.id,
                            stored = %current.recorded_at,
                            received = %sample.recorded_at,
                            "dropping out-of-order location sample"
                        );
                        return;
                    }
                }
                vehicle.current_location = Some(sample);
            },
        )
    }

    /// Manually set a fleet-management status (`Available`, `OutOfService`,
    /// `Maintenance`).
    ///
    /// The four active-response states are only reachable through the
    /// dispatch coordinator, and a vehicle bound to an incident cannot be
    /// toggled out from under its response.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-fleet roles, `NotFound` for unknown ids,
    /// `InvalidTransition` when targeting an active-response state directly,
    /// `Conflict` when the vehicle is currently bound.
    pub fn set_status(
        &self,
        actor: &Actor,
        id: &str,
        status: VehicleStatus,
    ) -> DispatchResult<Vehicle> {
        actor.require(FLEET_ROLES, "change vehicle status")?;

        if status.is_active_response() {
            return Err(DispatchError::InvalidTransition(format!(
                "vehicle status '{status}' can only be reached through dispatch"
            )));
        }

        self.store.update_if(
            id,
            |vehicle| match &vehicle.current_incident_id {
                Some(incident_id) => Err(format!(
                    "vehicle is responding to incident {incident_id}; release it via the dispatch flow first"
                )),
                None => Ok(()),
            },
            |vehicle| vehicle.status = status,
        )
    }

    /// Store access for the dispatch coordinator, which is the sole writer
    /// of active-response statuses and bindings.
    pub(crate) fn store(&self) -> &Store<Vehicle> {
        &self.store
    }
}
