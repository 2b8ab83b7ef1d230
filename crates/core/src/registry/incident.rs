//! Incident registry: intake, lookup, and append-only field records.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::actor::{Actor, CLINICAL_ROLES};
use crate::config::CoreConfig;
use crate::error::{DispatchError, DispatchResult, Entity};
use crate::incident::{
    incident_code, Incident, IncidentReport, IncidentStatus, Priority, TreatmentRecord,
    VitalReading,
};
use crate::registry::store::Store;

/// How many random id suffixes to try before giving up. With 10,000 possible
/// suffixes per day this only trips when a day's codes are nearly exhausted.
const MAX_ID_ATTEMPTS: u32 = 64;

/// Filter for incident listings.
///
/// Empty status set means "any status". Date bounds apply to `reported_at`.
#[derive(Clone, Debug, Default)]
pub struct IncidentFilter {
    pub statuses: Vec<IncidentStatus>,
    pub priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl IncidentFilter {
    /// Incidents reported since local midnight UTC, the "today" board.
    pub fn today(now: DateTime<Utc>) -> Self {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        Self {
            from: Some(midnight),
            ..Self::default()
        }
    }

    fn matches(&self, incident: &Incident) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&incident.status) {
            return false;
        }
        if let Some(priority) = self.priority {
            if incident.priority != priority {
                return false;
            }
        }
        if let Some(from) = self.from {
            if incident.reported_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if incident.reported_at > to {
                return false;
            }
        }
        true
    }
}

/// A vitals reading as submitted by field staff; the registry stamps time
/// and author.
#[derive(Clone, Debug, Default)]
pub struct VitalInput {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub pain_scale: Option<u8>,
}

/// An administered treatment as submitted by field staff.
#[derive(Clone, Debug)]
pub struct TreatmentInput {
    pub treatment: String,
    pub notes: Option<String>,
}

/// Creates and stores incident records.
///
/// Status and vehicle-binding mutations are the dispatch coordinator's job;
/// this registry only ever writes the `Reported` state and the append-only
/// field records.
#[derive(Debug)]
pub struct IncidentRegistry {
    cfg: Arc<CoreConfig>,
    store: Store<Incident>,
}

impl IncidentRegistry {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            store: Store::new(Entity::Incident),
        }
    }

    /// File a new incident report.
    ///
    /// Any staff role may report; intake desks and field crews both file
    /// these. Generates a code of the form `EMG-YYYYMMDD-####`, retrying the
    /// random suffix on collision.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when a required field is missing and `Conflict`
    /// in the pathological case that no free code remains for the day.
    pub fn report(&self, actor: &Actor, report: IncidentReport) -> DispatchResult<Incident> {
        let now = Utc::now();
        let date = now.date_naive();
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = incident_code(self.cfg.incident_prefix(), date, rng.gen_range(0..10_000));
            let incident = report.clone().into_incident(id.clone(), now)?;
            if self.store.insert_if_vacant(&id, incident.clone()) {
                tracing::info!(
                    incident = %id,
                    priority = %incident.priority,
                    reported_by = %actor.staff_id,
                    "incident reported"
                );
                return Ok(incident);
            }
        }

        Err(DispatchError::Conflict(
            "could not allocate an incident code; today's codes are exhausted".into(),
        ))
    }

    /// Fetch an incident by code.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the code is unknown.
    pub fn get(&self, id: &str) -> DispatchResult<Incident> {
        self.store.get(id)
    }

    /// List incidents matching `filter`, newest first.
    pub fn list(&self, filter: &IncidentFilter) -> Vec<Incident> {
        let mut incidents = self.store.list(|incident| filter.matches(incident));
        incidents.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        incidents
    }

    /// Append a vitals reading. Does not change status.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-clinical roles, `NotFound` for unknown codes.
    pub fn append_vital(
        &self,
        actor: &Actor,
        id: &str,
        input: VitalInput,
    ) -> DispatchResult<Incident> {
        actor.require(CLINICAL_ROLES, "record vital signs")?;
        let reading = VitalReading {
            recorded_at: Utc::now(),
            recorded_by: actor.staff_id.clone(),
            blood_pressure: input.blood_pressure,
            heart_rate: input.heart_rate,
            oxygen_saturation: input.oxygen_saturation,
            pain_scale: input.pain_scale,
        };
        self.store
            .update_if(id, |_| Ok(()), |incident| incident.vital_signs.push(reading))
    }

    /// Append an administered-treatment record. Does not change status.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-clinical roles, `Validation` for a blank
    /// treatment, `NotFound` for unknown codes.
    pub fn append_treatment(
        &self,
        actor: &Actor,
        id: &str,
        input: TreatmentInput,
    ) -> DispatchResult<Incident> {
        actor.require(CLINICAL_ROLES, "record a treatment")?;
        if input.treatment.trim().is_empty() {
            return Err(DispatchError::Validation("treatment is required".into()));
        }
        let record = TreatmentRecord {
            administered_at: Utc::now(),
            administered_by: actor.staff_id.clone(),
            treatment: input.treatment.trim().to_owned(),
            notes: input.notes,
        };
        self.store
            .update_if(id, |_| Ok(()), |incident| incident.treatments.push(record))
    }

    /// Store access for the dispatch coordinator, which is the sole writer
    /// of post-`Reported` statuses and bindings.
    pub(crate) fn store(&self) -> &Store<Incident> {
        &self.store
    }
}
