//! Incident records and their lifecycle vocabulary.
//!
//! An incident is a reported emergency tracked from intake to resolution. It
//! is created in `Reported`, bound to a vehicle by the dispatch coordinator,
//! advanced through the active-response chain, and ends in one of the two
//! terminal states. Records are never physically deleted.

use chrono::{DateTime, NaiveDate, Utc};
use ems_types::{NonEmptyText, PhoneNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DispatchError, DispatchResult};

// ============================================================================
// STATUS AND PRIORITY
// ============================================================================

/// Incident lifecycle status.
///
/// `Reported` is the only pre-binding state; `Completed` and `Cancelled` are
/// terminal. The four states in between are shared vocabulary with the bound
/// vehicle and may only be entered through the dispatch coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    Dispatched,
    EnRoute,
    OnScene,
    Transporting,
    Completed,
    Cancelled,
}

impl IncidentStatus {
    /// True for `Completed` and `Cancelled`; no further transitions permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, IncidentStatus::Completed | IncidentStatus::Cancelled)
    }

    /// True while the incident is bound to a vehicle.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            IncidentStatus::Dispatched
                | IncidentStatus::EnRoute
                | IncidentStatus::OnScene
                | IncidentStatus::Transporting
        )
    }

    /// Position on the ordered response chain. Terminal states have no rank;
    /// they are reachable from anywhere on the chain.
    pub(crate) fn rank(self) -> Option<u8> {
        match self {
            IncidentStatus::Reported => Some(0),
            IncidentStatus::Dispatched => Some(1),
            IncidentStatus::EnRoute => Some(2),
            IncidentStatus::OnScene => Some(3),
            IncidentStatus::Transporting => Some(4),
            IncidentStatus::Completed | IncidentStatus::Cancelled => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Reported => "reported",
            IncidentStatus::Dispatched => "dispatched",
            IncidentStatus::EnRoute => "en_route",
            IncidentStatus::OnScene => "on_scene",
            IncidentStatus::Transporting => "transporting",
            IncidentStatus::Completed => "completed",
            IncidentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reported" => Ok(IncidentStatus::Reported),
            "dispatched" => Ok(IncidentStatus::Dispatched),
            "en_route" => Ok(IncidentStatus::EnRoute),
            "on_scene" => Ok(IncidentStatus::OnScene),
            "transporting" => Ok(IncidentStatus::Transporting),
            "completed" => Ok(IncidentStatus::Completed),
            "cancelled" => Ok(IncidentStatus::Cancelled),
            other => Err(DispatchError::Validation(format!(
                "unknown incident status: '{other}'"
            ))),
        }
    }
}

/// Triage priority, set once at report time and immutable afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(DispatchError::Validation(format!(
                "unknown priority: '{other}'"
            ))),
        }
    }
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// The person who phoned the incident in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerInfo {
    pub name: String,
    pub phone: String,
    pub relation: Option<String>,
}

/// Descriptive patient fields gathered at intake. Free text, not validated
/// against a medical ontology.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub age: Option<u16>,
    pub gender: Option<String>,
    pub condition: String,
    pub chief_complaint: Option<String>,
}

/// Where the incident is. An address string plus optional landmark text; no
/// guaranteed geocoordinates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncidentSite {
    pub address: String,
    pub landmark: Option<String>,
}

/// A timestamped vital-signs reading taken by field staff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VitalReading {
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub pain_scale: Option<u8>,
}

/// An administered-treatment record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub administered_at: DateTime<Utc>,
    pub administered_by: String,
    pub treatment: String,
    pub notes: Option<String>,
}

/// A reported emergency tracked from report to resolution.
///
/// Invariant: `assigned_vehicle_id` is non-null exactly while `status` is one
/// of the four active-response states. The dispatch coordinator is the only
/// writer of `status` beyond `Reported` and of the vehicle binding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub status: IncidentStatus,
    pub priority: Priority,
    pub incident_type: Option<String>,
    pub caller: CallerInfo,
    pub patient: PatientInfo,
    pub site: IncidentSite,
    pub assigned_vehicle_id: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub transport_started_at: Option<DateTime<Utc>>,
    pub arrived_hospital_at: Option<DateTime<Utc>>,
    pub vital_signs: Vec<VitalReading>,
    pub treatments: Vec<TreatmentRecord>,
}

// ============================================================================
// INTAKE INPUT
// ============================================================================

/// Raw intake input for a new incident report.
///
/// Required fields: caller name, caller phone, address, patient condition.
/// Priority defaults to `Medium` when omitted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IncidentReport {
    pub priority: Option<Priority>,
    pub incident_type: Option<String>,
    pub caller_name: String,
    pub caller_phone: String,
    pub caller_relation: Option<String>,
    pub patient_name: Option<String>,
    pub patient_age: Option<u16>,
    pub patient_gender: Option<String>,
    pub patient_condition: String,
    pub chief_complaint: Option<String>,
    pub address: String,
    pub landmark: Option<String>,
}

impl IncidentReport {
    /// Validate the required subset and build the stored record.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Validation` naming the first offending field.
    pub(crate) fn into_incident(
        self,
        id: String,
        reported_at: DateTime<Utc>,
    ) -> DispatchResult<Incident> {
        let caller_name = required_text("caller_name", &self.caller_name)?;
        let caller_phone = PhoneNumber::new(&self.caller_phone)
            .map_err(|e| DispatchError::Validation(format!("caller_phone: {e}")))?;
        let address = required_text("address", &self.address)?;
        let condition = required_text("patient_condition", &self.patient_condition)?;

        Ok(Incident {
            id,
            status: IncidentStatus::Reported,
            priority: self.priority.unwrap_or_default(),
            incident_type: self.incident_type,
            caller: CallerInfo {
                name: caller_name.into_inner(),
                phone: caller_phone.as_str().to_owned(),
                relation: self.caller_relation,
            },
            patient: PatientInfo {
                name: self.patient_name,
                age: self.patient_age,
                gender: self.patient_gender,
                condition: condition.into_inner(),
                chief_complaint: self.chief_complaint,
            },
            site: IncidentSite {
                address: address.into_inner(),
                landmark: self.landmark,
            },
            assigned_vehicle_id: None,
            reported_at,
            transport_started_at: None,
            arrived_hospital_at: None,
            vital_signs: Vec::new(),
            treatments: Vec::new(),
        })
    }
}

fn required_text(field: &str, value: &str) -> DispatchResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|_| DispatchError::Validation(format!("{field} is required")))
}

/// Build a human-readable incident code: `EMG-YYYYMMDD-####`.
pub(crate) fn incident_code(prefix: &str, date: NaiveDate, suffix: u16) -> String {
    format!("{prefix}-{}-{suffix:04}", date.format("%Y%m%d"))
}
