//! Dispatch coordinator: the incident/vehicle state machine.
//!
//! This is the only component allowed to create or release an
//! incident/vehicle binding, and the only writer of the four shared
//! active-response statuses. All of its operations run behind a single gate
//! mutex, so concurrent dispatches and advances are evaluated against each
//! other's results rather than against stale reads. The store-level
//! compare-and-swap is kept as a second line: a manual fleet toggle racing a
//! dispatch fails the precondition instead of being overwritten.
//!
//! Transition policy (see DESIGN.md): the active chain is ordered
//! `Dispatched → EnRoute → OnScene → Transporting`. Forward skips within the
//! chain are permitted (field reality outpaces data entry and intake
//! workflows jump states) but backward transitions never are. The terminal
//! states are reachable from any bound state, and `Cancelled` additionally
//! from `Reported` (a call cancelled before any vehicle was assigned).

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};

use crate::actor::{Actor, Role, DISPATCH_ROLES};
use crate::error::{DispatchError, DispatchResult};
use crate::incident::{Incident, IncidentStatus};
use crate::registry::{IncidentRegistry, VehicleRegistry};
use crate::vehicle::VehicleStatus;

/// Binds incidents to vehicles and advances both through the response
/// lifecycle in lockstep.
#[derive(Debug)]
pub struct DispatchCoordinator {
    incidents: Arc<IncidentRegistry>,
    vehicles: Arc<VehicleRegistry>,
    gate: Mutex<()>,
}

impl DispatchCoordinator {
    pub fn new(incidents: Arc<IncidentRegistry>, vehicles: Arc<VehicleRegistry>) -> Self {
        Self {
            incidents,
            vehicles,
            gate: Mutex::new(()),
        }
    }

    /// Bind an `Available` vehicle to a `Reported` incident.
    ///
    /// Both records change together or neither does. Under contention, when
    /// two dispatchers target the same vehicle or incident, exactly one
    /// caller succeeds; the rest receive `Conflict`, never a silent
    /// override.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-dispatch roles, `NotFound` for unknown ids,
    /// `Conflict` when the incident is no longer `Reported` or the vehicle
    /// is no longer `Available`.
    pub fn dispatch(
        &self,
        actor: &Actor,
        incident_id: &str,
        vehicle_id: &str,
    ) -> DispatchResult<Incident> {
        actor.require(DISPATCH_ROLES, "dispatch a vehicle")?;
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Surface NotFound before Conflict so a bad id reads as a bad id.
        let incident = self.incidents.get(incident_id)?;
        self.vehicles.get(vehicle_id)?;

        if incident.status != IncidentStatus::Reported {
            return Err(DispatchError::Conflict(format!(
                "incident {incident_id} is {}, not reported",
                incident.status
            )));
        }

        // Take the vehicle first: it is the contended resource. The incident
        // step below cannot fail a precondition while we hold the gate, but
        // if it does fail the vehicle is rolled back before returning.
        self.vehicles.store().update_if(
            vehicle_id,
            |vehicle| match vehicle.status {
                VehicleStatus::Available => Ok(()),
                status => Err(format!("vehicle {vehicle_id} is {status}, not available")),
            },
            |vehicle| {
                vehicle.status = VehicleStatus::Dispatched;
                vehicle.current_incident_id = Some(incident_id.to_owned());
            },
        )?;

        let bound = self.incidents.store().update_if(
            incident_id,
            |incident| match incident.status {
                IncidentStatus::Reported => Ok(()),
                status => Err(format!("incident {incident_id} is {status}, not reported")),
            },
            |incident| {
                incident.status = IncidentStatus::Dispatched;
                incident.assigned_vehicle_id = Some(vehicle_id.to_owned());
            },
        );

        match bound {
            Ok(incident) => {
                tracing::info!(
                    incident = %incident_id,
                    vehicle = %vehicle_id,
                    dispatcher = %actor.staff_id,
                    "vehicle dispatched"
                );
                Ok(incident)
            }
            Err(e) => {
                let rollback = self.vehicles.store().update_if(
                    vehicle_id,
                    |_| Ok(()),
                    |vehicle| {
                        vehicle.status = VehicleStatus::Available;
                        vehicle.current_incident_id = None;
                    },
                );
                if let Err(rollback_err) = rollback {
                    tracing::error!(
                        vehicle = %vehicle_id,
                        error = %rollback_err,
                        "failed to roll back vehicle after dispatch failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Advance an incident (and its bound vehicle, in lockstep) to
    /// `next`.
    ///
    /// Entering `Transporting` stamps `transport_started_at` once; entering
    /// `Completed` stamps `arrived_hospital_at`. A terminal transition
    /// releases the vehicle back to `Available` and clears the binding on
    /// both sides.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the actor is dispatch staff or crew on the bound
    /// vehicle, `NotFound` for unknown incidents, `InvalidTransition` for
    /// anything but a forward move on the chain or a terminal jump,
    /// `Conflict` when a concurrent advance won the race.
    pub fn advance(
        &self,
        actor: &Actor,
        incident_id: &str,
        next: IncidentStatus,
    ) -> DispatchResult<Incident> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        let incident = self.incidents.get(incident_id)?;
        self.authorise_advance(actor, &incident)?;
        legal_successor(incident.status, next)?;

        let previous_status = incident.status;
        let vehicle_id = incident.assigned_vehicle_id.clone();
        let now = Utc::now();

        let updated = self.incidents.store().update_if(
            incident_id,
            |current| {
                if current.status == previous_status {
                    Ok(())
                } else {
                    Err(format!(
                        "incident {incident_id} advanced concurrently to {}",
                        current.status
                    ))
                }
            },
            |incident| {
                incident.status = next;
                if next == IncidentStatus::Transporting && incident.transport_started_at.is_none()
                {
                    incident.transport_started_at = Some(now);
                }
                if next == IncidentStatus::Completed && incident.arrived_hospital_at.is_none() {
                    incident.arrived_hospital_at = Some(now);
                }
                if next.is_terminal() {
                    incident.assigned_vehicle_id = None;
                }
            },
        )?;

        if let Some(vehicle_id) = vehicle_id {
            self.vehicles.store().update_if(
                &vehicle_id,
                |_| Ok(()),
                |vehicle| {
                    if next.is_terminal() {
                        vehicle.status = VehicleStatus::Available;
                        vehicle.current_incident_id = None;
                    } else if let Some(mirrored) = VehicleStatus::mirroring(next) {
                        vehicle.status = mirrored;
                    }
                },
            )?;
        }

        tracing::info!(
            incident = %incident_id,
            from = %previous_status,
            to = %next,
            by = %actor.staff_id,
            "incident advanced"
        );
        Ok(updated)
    }

    /// Dispatch staff may advance any incident; field crew only the incident
    /// bound to their own vehicle.
    fn authorise_advance(&self, actor: &Actor, incident: &Incident) -> DispatchResult<()> {
        if DISPATCH_ROLES.contains(&actor.role) {
            return Ok(());
        }
        if matches!(actor.role, Role::Driver | Role::Paramedic) {
            if let (Some(own), Some(bound)) = (&actor.vehicle_id, &incident.assigned_vehicle_id) {
                if own == bound {
                    return Ok(());
                }
            }
        }
        Err(DispatchError::Forbidden {
            role: actor.role.to_string(),
            action: format!("advance incident {}", incident.id),
        })
    }
}

/// Validate that `next` is a legal successor of `current`.
pub fn legal_successor(current: IncidentStatus, next: IncidentStatus) -> DispatchResult<()> {
    if current.is_terminal() {
        return Err(DispatchError::InvalidTransition(format!(
            "incident is already {current}; terminal states permit no further transitions"
        )));
    }
    match next {
        IncidentStatus::Cancelled => Ok(()),
        IncidentStatus::Completed => {
            if current.is_active() {
                Ok(())
            } else {
                Err(DispatchError::InvalidTransition(
                    "a reported incident cannot complete; dispatch it or cancel it".into(),
                ))
            }
        }
        IncidentStatus::Reported => Err(DispatchError::InvalidTransition(
            "an incident cannot return to reported".into(),
        )),
        _ => {
            if current == IncidentStatus::Reported {
                return Err(DispatchError::InvalidTransition(format!(
                    "a reported incident must be dispatched before moving to {next}"
                )));
            }
            // Both ranks exist here: terminal cases were handled above.
            if next.rank() > current.rank() {
                Ok(())
            } else {
                Err(DispatchError::InvalidTransition(format!(
                    "cannot move backward (or stay) from {current} to {next}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use crate::config::CoreConfig;
    use crate::incident::{IncidentReport, Priority};
    use crate::registry::IncidentFilter;
    use crate::vehicle::{VehicleRegistration, VehicleType};
    use std::thread;

    struct Harness {
        incidents: Arc<IncidentRegistry>,
        vehicles: Arc<VehicleRegistry>,
        coordinator: DispatchCoordinator,
        dispatcher: Actor,
    }

    fn harness() -> Harness {
        let incidents = Arc::new(IncidentRegistry::new(Arc::new(CoreConfig::default())));
        let vehicles = Arc::new(VehicleRegistry::new());
        let coordinator = DispatchCoordinator::new(incidents.clone(), vehicles.clone());
        Harness {
            incidents,
            vehicles,
            coordinator,
            dispatcher: Actor::new("s-disp", Role::Dispatcher),
        }
    }

    impl Harness {
        fn report(&self) -> Incident {
            self.incidents
                .report(
                    &Actor::new("s-recept", Role::Receptionist),
                    IncidentReport {
                        priority: Some(Priority::Critical),
                        caller_name: "A".into(),
                        caller_phone: "555".into(),
                        patient_condition: "chest pain".into(),
                        address: "123 Main St".into(),
                        ..IncidentReport::default()
                    },
                )
                .expect("report accepted")
        }

        fn add_vehicle(&self, id: &str) {
            self.vehicles
                .register(
                    &self.dispatcher,
                    VehicleRegistration {
                        id: id.into(),
                        call_sign: format!("Rescue {id}"),
                        vehicle_number: "KA-01-7788".into(),
                        base_station: "Central".into(),
                        vehicle_type: VehicleType::AdvancedLifeSupport,
                        crew: vec![],
                    },
                )
                .expect("vehicle registered");
        }
    }

    #[test]
    fn full_lifecycle_end_to_end() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");

        let dispatched = h
            .coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .expect("dispatch succeeds");
        assert_eq!(dispatched.status, IncidentStatus::Dispatched);
        assert_eq!(dispatched.assigned_vehicle_id.as_deref(), Some("V1"));

        let vehicle = h.vehicles.get("V1").unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Dispatched);
        assert_eq!(vehicle.current_incident_id.as_deref(), Some(incident.id.as_str()));

        for next in [
            IncidentStatus::EnRoute,
            IncidentStatus::OnScene,
            IncidentStatus::Transporting,
        ] {
            let advanced = h
                .coordinator
                .advance(&h.dispatcher, &incident.id, next)
                .expect("legal advance");
            assert_eq!(advanced.status, next);
            assert_eq!(h.vehicles.get("V1").unwrap().status.as_str(), next.as_str());
        }

        let transporting = h.incidents.get(&incident.id).unwrap();
        let started = transporting
            .transport_started_at
            .expect("transport timestamp set");

        let completed = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Completed)
            .expect("completion");
        assert_eq!(completed.status, IncidentStatus::Completed);
        assert!(completed.assigned_vehicle_id.is_none());
        assert_eq!(completed.transport_started_at, Some(started));
        assert!(completed.arrived_hospital_at.is_some());

        let vehicle = h.vehicles.get("V1").unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Available);
        assert!(vehicle.current_incident_id.is_none());
    }

    #[test]
    fn dispatch_is_exactly_once_under_contention() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");

        let coordinator = Arc::new(h.coordinator);
        let mut handles = Vec::new();
        for n in 0..8 {
            let coordinator = coordinator.clone();
            let incident_id = incident.id.clone();
            handles.push(thread::spawn(move || {
                let dispatcher = Actor::new(format!("disp-{n}"), Role::Dispatcher);
                coordinator.dispatch(&dispatcher, &incident_id, "V1")
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.join().expect("thread finished") {
                Ok(_) => successes += 1,
                Err(DispatchError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn dispatch_rejects_non_available_vehicle_and_non_reported_incident() {
        let h = harness();
        let first = h.report();
        let second = h.report();
        h.add_vehicle("V1");

        h.coordinator
            .dispatch(&h.dispatcher, &first.id, "V1")
            .expect("first dispatch");

        // Same vehicle, second incident: vehicle is no longer available.
        let err = h.coordinator.dispatch(&h.dispatcher, &second.id, "V1");
        assert!(matches!(err, Err(DispatchError::Conflict(_))));

        // Same incident, fresh vehicle: incident is no longer reported.
        h.add_vehicle("V2");
        let err = h.coordinator.dispatch(&h.dispatcher, &first.id, "V2");
        assert!(matches!(err, Err(DispatchError::Conflict(_))));

        // Unknown ids are NotFound, never Conflict.
        let err = h.coordinator.dispatch(&h.dispatcher, &second.id, "V9");
        assert!(matches!(err, Err(DispatchError::NotFound { .. })));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");
        h.coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .unwrap();
        h.coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::OnScene)
            .expect("forward skip is permitted");

        let err = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::EnRoute);
        assert!(matches!(err, Err(DispatchError::InvalidTransition(_))));

        let err = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::OnScene);
        assert!(matches!(err, Err(DispatchError::InvalidTransition(_))));
    }

    #[test]
    fn cancellation_releases_the_vehicle_from_any_active_state() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");
        h.coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .unwrap();
        h.coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::EnRoute)
            .unwrap();

        let cancelled = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Cancelled)
            .expect("cancel en-route");
        assert_eq!(cancelled.status, IncidentStatus::Cancelled);
        assert!(cancelled.assigned_vehicle_id.is_none());

        let vehicle = h.vehicles.get("V1").unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Available);
        assert!(vehicle.current_incident_id.is_none());

        let err = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::EnRoute);
        assert!(matches!(err, Err(DispatchError::InvalidTransition(_))));
    }

    #[test]
    fn reported_incident_can_only_cancel() {
        let h = harness();
        let incident = h.report();

        let err = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Completed);
        assert!(matches!(err, Err(DispatchError::InvalidTransition(_))));

        let err = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::EnRoute);
        assert!(matches!(err, Err(DispatchError::InvalidTransition(_))));

        let cancelled = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Cancelled)
            .expect("cancel before dispatch");
        assert_eq!(cancelled.status, IncidentStatus::Cancelled);
        assert!(cancelled.assigned_vehicle_id.is_none());
    }

    #[test]
    fn transport_timestamp_is_set_once() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");
        h.coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .unwrap();

        let transporting = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Transporting)
            .expect("skip straight to transporting");
        let started = transporting.transport_started_at.expect("stamped");

        let completed = h
            .coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Completed)
            .unwrap();
        assert_eq!(completed.transport_started_at, Some(started));
    }

    #[test]
    fn crew_may_advance_only_their_own_incident() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");
        h.coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .unwrap();

        let own_driver = Actor::new("s-drv", Role::Driver).with_vehicle("V1");
        let other_driver = Actor::new("s-drv2", Role::Driver).with_vehicle("V2");
        let nurse = Actor::new("s-n", Role::Nurse);

        assert!(matches!(
            h.coordinator
                .advance(&other_driver, &incident.id, IncidentStatus::EnRoute),
            Err(DispatchError::Forbidden { .. })
        ));
        assert!(matches!(
            h.coordinator
                .advance(&nurse, &incident.id, IncidentStatus::EnRoute),
            Err(DispatchError::Forbidden { .. })
        ));
        assert!(h
            .coordinator
            .advance(&own_driver, &incident.id, IncidentStatus::EnRoute)
            .is_ok());
    }

    #[test]
    fn binding_invariant_holds_across_the_lifecycle() {
        let h = harness();
        let incident = h.report();
        h.add_vehicle("V1");

        let check = |h: &Harness| {
            for incident in h.incidents.list(&IncidentFilter::default()) {
                let bound = incident.assigned_vehicle_id.is_some();
                assert_eq!(bound, incident.status.is_active(), "at {}", incident.status);
            }
        };

        check(&h);
        h.coordinator
            .dispatch(&h.dispatcher, &incident.id, "V1")
            .unwrap();
        check(&h);
        h.coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Transporting)
            .unwrap();
        check(&h);
        h.coordinator
            .advance(&h.dispatcher, &incident.id, IncidentStatus::Completed)
            .unwrap();
        check(&h);
    }
}
