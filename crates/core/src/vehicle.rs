//! Ambulance records: identity, crew, status, and last-known position.

use chrono::{DateTime, Utc};
use ems_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DispatchError, DispatchResult};
use crate::incident::IncidentStatus;

// ============================================================================
// STATUS
// ============================================================================

/// Vehicle status.
///
/// The four active-response states mirror the bound incident and may only be
/// entered through the dispatch coordinator. `Available`, `OutOfService`, and
/// `Maintenance` are fleet-management states for unbound vehicles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Dispatched,
    EnRoute,
    OnScene,
    Transporting,
    OutOfService,
    Maintenance,
}

impl VehicleStatus {
    /// True for the four coordinator-only states.
    pub fn is_active_response(self) -> bool {
        matches!(
            self,
            VehicleStatus::Dispatched
                | VehicleStatus::EnRoute
                | VehicleStatus::OnScene
                | VehicleStatus::Transporting
        )
    }

    /// The vehicle status mirroring an active incident status. `None` for
    /// incident states a bound vehicle never mirrors.
    pub(crate) fn mirroring(incident: IncidentStatus) -> Option<VehicleStatus> {
        match incident {
            IncidentStatus::Dispatched => Some(VehicleStatus::Dispatched),
            IncidentStatus::EnRoute => Some(VehicleStatus::EnRoute),
            IncidentStatus::OnScene => Some(VehicleStatus::OnScene),
            IncidentStatus::Transporting => Some(VehicleStatus::Transporting),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Dispatched => "dispatched",
            VehicleStatus::EnRoute => "en_route",
            VehicleStatus::OnScene => "on_scene",
            VehicleStatus::Transporting => "transporting",
            VehicleStatus::OutOfService => "out_of_service",
            VehicleStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "available" => Ok(VehicleStatus::Available),
            "dispatched" => Ok(VehicleStatus::Dispatched),
            "en_route" => Ok(VehicleStatus::EnRoute),
            "on_scene" => Ok(VehicleStatus::OnScene),
            "transporting" => Ok(VehicleStatus::Transporting),
            "out_of_service" => Ok(VehicleStatus::OutOfService),
            "maintenance" => Ok(VehicleStatus::Maintenance),
            other => Err(DispatchError::Validation(format!(
                "unknown vehicle status: '{other}'"
            ))),
        }
    }
}

/// Ambulance capability class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    BasicLifeSupport,
    AdvancedLifeSupport,
    MobileIcu,
}

impl VehicleType {
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::BasicLifeSupport => "basic_life_support",
            VehicleType::AdvancedLifeSupport => "advanced_life_support",
            VehicleType::MobileIcu => "mobile_icu",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "basic_life_support" => Ok(VehicleType::BasicLifeSupport),
            "advanced_life_support" => Ok(VehicleType::AdvancedLifeSupport),
            "mobile_icu" => Ok(VehicleType::MobileIcu),
            other => Err(DispatchError::Validation(format!(
                "unknown vehicle type: '{other}'"
            ))),
        }
    }
}

// ============================================================================
// CREW AND POSITION
// ============================================================================

/// Crew position on an ambulance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewRole {
    Driver,
    Paramedic,
    Doctor,
    Nurse,
}

/// A staff member assigned to a vehicle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrewMember {
    pub staff_id: String,
    pub name: String,
    pub role: CrewRole,
}

/// A single position report from a vehicle's driver app.
///
/// Ephemeral: each newer sample supersedes the previous one. No history is
/// retained by the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// VEHICLE RECORD
// ============================================================================

/// An ambulance unit.
///
/// Invariant: bound to at most one active incident at a time;
/// `current_incident_id` is non-null exactly while `status` is one of the
/// four active-response states.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub call_sign: String,
    pub vehicle_number: String,
    pub base_station: String,
    pub vehicle_type: VehicleType,
    pub status: VehicleStatus,
    pub crew: Vec<CrewMember>,
    pub current_location: Option<LocationSample>,
    pub current_incident_id: Option<String>,
}

/// Fleet-administration input creating a new vehicle.
///
/// New vehicles start `Available` with no position and no crew changes
/// tracked beyond the roster given here.
#[derive(Clone, Debug, Deserialize)]
pub struct VehicleRegistration {
    pub id: String,
    pub call_sign: String,
    pub vehicle_number: String,
    pub base_station: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

impl VehicleRegistration {
    pub(crate) fn into_vehicle(self) -> DispatchResult<Vehicle> {
        let id = required("id", &self.id)?;
        let call_sign = required("call_sign", &self.call_sign)?;
        let vehicle_number = required("vehicle_number", &self.vehicle_number)?;
        let base_station = required("base_station", &self.base_station)?;

        Ok(Vehicle {
            id,
            call_sign,
            vehicle_number,
            base_station,
            vehicle_type: self.vehicle_type,
            status: VehicleStatus::Available,
            crew: self.crew,
            current_location: None,
            current_incident_id: None,
        })
    }
}

fn required(field: &str, value: &str) -> DispatchResult<String> {
    NonEmptyText::new(value)
        .map(NonEmptyText::into_inner)
        .map_err(|_| DispatchError::Validation(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_requires_identity_fields() {
        let reg = VehicleRegistration {
            id: "AMB-01".into(),
            call_sign: "Rescue 1".into(),
            vehicle_number: "KA-01-7788".into(),
            base_station: "Central".into(),
            vehicle_type: VehicleType::AdvancedLifeSupport,
            crew: vec![],
        };
        let vehicle = reg.clone().into_vehicle().expect("valid registration");
        assert_eq!(vehicle.status, VehicleStatus::Available);
        assert!(vehicle.current_incident_id.is_none());

        let mut blank = reg;
        blank.call_sign = " ".into();
        assert!(blank.into_vehicle().is_err());
    }

    #[test]
    fn mirroring_covers_exactly_the_active_chain() {
        assert_eq!(
            VehicleStatus::mirroring(IncidentStatus::EnRoute),
            Some(VehicleStatus::EnRoute)
        );
        assert_eq!(VehicleStatus::mirroring(IncidentStatus::Reported), None);
        assert_eq!(VehicleStatus::mirroring(IncidentStatus::Completed), None);
    }

    #[test]
    fn active_response_states_are_closed() {
        assert!(VehicleStatus::Dispatched.is_active_response());
        assert!(VehicleStatus::Transporting.is_active_response());
        assert!(!VehicleStatus::Available.is_active_response());
        assert!(!VehicleStatus::Maintenance.is_active_response());
    }
}
