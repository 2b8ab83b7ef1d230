//! Acting-staff context for core operations.
//!
//! Authentication itself (session issuance, role lookup) is an external
//! collaborator. The core only ever sees an explicit [`Actor`] parameter,
//! never ambient or thread-local state, so every operation stays testable
//! without a web framework in front of it.

use crate::error::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Staff roles recognised by the hospital operations system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    Dispatcher,
    Doctor,
    Nurse,
    Dietician,
    Driver,
    Paramedic,
    Receptionist,
    WardManager,
    LabTechnician,
    InfectionControl,
}

/// Roles allowed to create or advance an incident/vehicle binding.
pub const DISPATCH_ROLES: &[Role] = &[Role::Admin, Role::Dispatcher];

/// Roles allowed to acknowledge an inbound patient at the ER.
pub const ER_ROLES: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse];

/// Roles allowed to append vitals and treatments during a response.
pub const CLINICAL_ROLES: &[Role] = &[
    Role::Admin,
    Role::Doctor,
    Role::Nurse,
    Role::Paramedic,
];

/// Roles allowed to register vehicles and toggle fleet availability.
pub const FLEET_ROLES: &[Role] = &[Role::Admin, Role::Dispatcher];

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dispatcher => "dispatcher",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Dietician => "dietician",
            Role::Driver => "driver",
            Role::Paramedic => "paramedic",
            Role::Receptionist => "receptionist",
            Role::WardManager => "ward-manager",
            Role::LabTechnician => "lab-technician",
            Role::InfectionControl => "infection-control",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "dispatcher" => Ok(Role::Dispatcher),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "dietician" => Ok(Role::Dietician),
            "driver" => Ok(Role::Driver),
            "paramedic" => Ok(Role::Paramedic),
            "receptionist" => Ok(Role::Receptionist),
            "ward-manager" => Ok(Role::WardManager),
            "lab-technician" => Ok(Role::LabTechnician),
            "infection-control" => Ok(Role::InfectionControl),
            other => Err(DispatchError::Validation(format!(
                "unknown staff role: '{other}'"
            ))),
        }
    }
}

/// The staff member on whose behalf a core operation runs.
///
/// `vehicle_id` is the vehicle this actor is crewed on, if any. Drivers and
/// paramedics may only act on their own vehicle.
#[derive(Clone, Debug)]
pub struct Actor {
    pub staff_id: String,
    pub role: Role,
    pub vehicle_id: Option<String>,
}

impl Actor {
    pub fn new(staff_id: impl Into<String>, role: Role) -> Self {
        Self {
            staff_id: staff_id.into(),
            role,
            vehicle_id: None,
        }
    }

    pub fn with_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    /// Require that this actor holds one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Forbidden` naming the role and the attempted
    /// action when the role is not in the allowed set.
    pub fn require(&self, allowed: &[Role], action: &str) -> DispatchResult<()> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        Err(DispatchError::Forbidden {
            role: self.role.to_string(),
            action: action.to_owned(),
        })
    }

    /// Require that this actor may act on `vehicle_id`.
    ///
    /// Dispatchers and admins may act on any vehicle; field crew only on the
    /// vehicle they are assigned to.
    pub fn require_vehicle_access(&self, vehicle_id: &str, action: &str) -> DispatchResult<()> {
        match self.role {
            Role::Admin | Role::Dispatcher => Ok(()),
            Role::Driver | Role::Paramedic
                if self.vehicle_id.as_deref() == Some(vehicle_id) =>
            {
                Ok(())
            }
            _ => Err(DispatchError::Forbidden {
                role: self.role.to_string(),
                action: format!("{action} for vehicle {vehicle_id}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::WardManager, Role::InfectionControl] {
            let parsed: Role = role.to_string().parse().expect("parse role");
            assert_eq!(parsed, role);
        }
        assert!("surgeon".parse::<Role>().is_err());
    }

    #[test]
    fn require_names_the_denied_action() {
        let actor = Actor::new("s-1", Role::Dietician);
        let err = actor.require(DISPATCH_ROLES, "dispatch a vehicle");
        match err {
            Err(DispatchError::Forbidden { role, action }) => {
                assert_eq!(role, "dietician");
                assert_eq!(action, "dispatch a vehicle");
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn drivers_are_limited_to_their_own_vehicle() {
        let driver = Actor::new("s-2", Role::Driver).with_vehicle("AMB-01");
        assert!(driver.require_vehicle_access("AMB-01", "push location").is_ok());
        assert!(driver.require_vehicle_access("AMB-02", "push location").is_err());

        let dispatcher = Actor::new("s-3", Role::Dispatcher);
        assert!(dispatcher
            .require_vehicle_access("AMB-02", "push location")
            .is_ok());
    }
}
