//! ER handoff tracking.
//!
//! Acknowledgment is evidence, not a trigger: recording that the ER has
//! taken custody of an inbound patient never moves the incident's lifecycle
//! status. That stays the dispatch coordinator's job, keeping a single
//! writer for status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::actor::{Actor, ER_ROLES};
use crate::error::{DispatchResult, Entity};
use crate::registry::store::Store;
use crate::registry::IncidentRegistry;

/// The acknowledgment event marking hospital custody of a transported
/// patient. At most one exists per incident.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErHandoff {
    pub id: Uuid,
    pub incident_id: String,
    pub acknowledged_by: String,
    pub acknowledged_at: DateTime<Utc>,
}

/// Records ER acknowledgments, one per incident.
#[derive(Debug)]
pub struct HandoffTracker {
    incidents: Arc<IncidentRegistry>,
    store: Store<ErHandoff>,
}

impl HandoffTracker {
    pub fn new(incidents: Arc<IncidentRegistry>) -> Self {
        Self {
            incidents,
            store: Store::new(Entity::Handoff),
        }
    }

    /// Acknowledge the inbound patient for `incident_id`.
    ///
    /// Idempotent: a second acknowledgment returns the existing record
    /// unchanged (same `acknowledged_by`, same `acknowledged_at`) rather
    /// than erroring or duplicating.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-ER roles, `NotFound` when the incident does not
    /// exist.
    pub fn acknowledge(&self, actor: &Actor, incident_id: &str) -> DispatchResult<ErHandoff> {
        actor.require(ER_ROLES, "acknowledge an inbound patient")?;
        self.incidents.get(incident_id)?;

        let (handoff, created) = self.store.get_or_insert_with(incident_id, || ErHandoff {
            id: Uuid::new_v4(),
            incident_id: incident_id.to_owned(),
            acknowledged_by: actor.staff_id.clone(),
            acknowledged_at: Utc::now(),
        });

        if created {
            tracing::info!(
                incident = %incident_id,
                by = %handoff.acknowledged_by,
                "inbound patient acknowledged"
            );
        } else {
            tracing::debug!(
                incident = %incident_id,
                "repeat acknowledgment; returning existing handoff"
            );
        }
        Ok(handoff)
    }

    /// The handoff for `incident_id`, if one has been recorded.
    pub fn find(&self, incident_id: &str) -> Option<ErHandoff> {
        self.store.find(incident_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use crate::config::CoreConfig;
    use crate::error::DispatchError;
    use crate::incident::{IncidentReport, Priority};

    fn tracker_with_incident() -> (HandoffTracker, String) {
        let incidents = Arc::new(IncidentRegistry::new(Arc::new(CoreConfig::default())));
        let incident = incidents
            .report(
                &Actor::new("s-r", Role::Receptionist),
                IncidentReport {
                    priority: Some(Priority::Critical),
                    caller_name: "A".into(),
                    caller_phone: "555".into(),
                    patient_condition: "chest pain".into(),
                    address: "123 Main St".into(),
                    ..IncidentReport::default()
                },
            )
            .unwrap();
        (HandoffTracker::new(incidents), incident.id)
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let (tracker, incident_id) = tracker_with_incident();
        let nurse = Actor::new("s-nurse", Role::Nurse);
        let doctor = Actor::new("s-doc", Role::Doctor);

        let first = tracker.acknowledge(&nurse, &incident_id).expect("first ack");
        let second = tracker
            .acknowledge(&doctor, &incident_id)
            .expect("repeat ack");

        assert_eq!(first.id, second.id);
        assert_eq!(second.acknowledged_by, "s-nurse");
        assert_eq!(first.acknowledged_at, second.acknowledged_at);
    }

    #[test]
    fn unknown_incident_is_not_found() {
        let (tracker, _) = tracker_with_incident();
        let nurse = Actor::new("s-nurse", Role::Nurse);
        assert!(matches!(
            tracker.acknowledge(&nurse, "EMG-19990101-0000"),
            Err(DispatchError::NotFound { .. })
        ));
    }

    #[test]
    fn only_er_roles_may_acknowledge() {
        let (tracker, incident_id) = tracker_with_incident();
        let driver = Actor::new("s-drv", Role::Driver);
        assert!(matches!(
            tracker.acknowledge(&driver, &incident_id),
            Err(DispatchError::Forbidden { .. })
        ));
        assert!(tracker.find(&incident_id).is_none());
    }
}
