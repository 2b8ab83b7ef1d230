//! JSON wire models for the dispatch API.
//!
//! Enumerated fields (statuses, priorities, vehicle and crew types) travel
//! as their canonical snake_case strings and are parsed, never trusted, at
//! this boundary, so an unknown string is a validation failure before it
//! can reach a record. Timestamps are RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ems_core::incident::{CallerInfo, IncidentSite, PatientInfo, TreatmentRecord, VitalReading};
use ems_core::registry::{TreatmentInput, VitalInput};
use ems_core::vehicle::{CrewMember, CrewRole};
use ems_core::{
    DispatchError, DispatchResult, ErHandoff, Incident, IncidentReport, LocationSample,
    PositionReport, Vehicle, VehicleRegistration,
};

// ============================================================================
// GENERIC RESPONSES
// ============================================================================

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body carried by every non-2xx response.
///
/// `error` is the machine-readable kind (`validation`, `not_found`,
/// `invalid_transition`, `conflict`, `forbidden`); `message` is for humans.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    pub message: String,
}

impl ErrorRes {
    /// The machine-readable kind for a core error.
    pub fn kind(err: &DispatchError) -> &'static str {
        match err {
            DispatchError::Validation(_) => "validation",
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::InvalidTransition(_) => "invalid_transition",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::Forbidden { .. } => "forbidden",
        }
    }
}

impl From<&DispatchError> for ErrorRes {
    fn from(err: &DispatchError) -> Self {
        Self {
            error: Self::kind(err).to_owned(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// INCIDENTS
// ============================================================================

/// Intake request for a new incident report.
///
/// Required: `caller_name`, `caller_phone`, `address`, `patient_condition`.
/// `priority` defaults to `medium`.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ReportIncidentReq {
    pub priority: Option<String>,
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

impl ReportIncidentReq {
    /// Convert to the core intake input, parsing the priority string.
    ///
    /// # Errors
    ///
    /// `DispatchError::Validation` for an unknown priority.
    pub fn into_report(self) -> DispatchResult<IncidentReport> {
        let priority = self
            .priority
            .filter(|p| !p.trim().is_empty())
            .map(|p| p.parse())
            .transpose()?;
        Ok(IncidentReport {
            priority,
            incident_type: self.incident_type,
            caller_name: self.caller_name,
            caller_phone: self.caller_phone,
            caller_relation: self.caller_relation,
            patient_name: self.patient_name,
            patient_age: self.patient_age,
            patient_gender: self.patient_gender,
            patient_condition: self.patient_condition,
            chief_complaint: self.chief_complaint,
            address: self.address,
            landmark: self.landmark,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallerDto {
    pub name: String,
    pub phone: String,
    pub relation: Option<String>,
}

impl From<CallerInfo> for CallerDto {
    fn from(caller: CallerInfo) -> Self {
        Self {
            name: caller.name,
            phone: caller.phone,
            relation: caller.relation,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientDto {
    pub name: Option<String>,
    pub age: Option<u16>,
    pub gender: Option<String>,
    pub condition: String,
    pub chief_complaint: Option<String>,
}

impl From<PatientInfo> for PatientDto {
    fn from(patient: PatientInfo) -> Self {
        Self {
            name: patient.name,
            age: patient.age,
            gender: patient.gender,
            condition: patient.condition,
            chief_complaint: patient.chief_complaint,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SiteDto {
    pub address: String,
    pub landmark: Option<String>,
}

impl From<IncidentSite> for SiteDto {
    fn from(site: IncidentSite) -> Self {
        Self {
            address: site.address,
            landmark: site.landmark,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VitalDto {
    pub recorded_at: String,
    pub recorded_by: String,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub pain_scale: Option<u8>,
}

impl From<VitalReading> for VitalDto {
    fn from(reading: VitalReading) -> Self {
        Self {
            recorded_at: reading.recorded_at.to_rfc3339(),
            recorded_by: reading.recorded_by,
            blood_pressure: reading.blood_pressure,
            heart_rate: reading.heart_rate,
            oxygen_saturation: reading.oxygen_saturation,
            pain_scale: reading.pain_scale,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TreatmentDto {
    pub administered_at: String,
    pub administered_by: String,
    pub treatment: String,
    pub notes: Option<String>,
}

impl From<TreatmentRecord> for TreatmentDto {
    fn from(record: TreatmentRecord) -> Self {
        Self {
            administered_at: record.administered_at.to_rfc3339(),
            administered_by: record.administered_by,
            treatment: record.treatment,
            notes: record.notes,
        }
    }
}

/// A full incident record on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentDto {
    pub id: String,
    pub status: String,
    pub priority: String,
    pub incident_type: Option<String>,
    pub caller: CallerDto,
    pub patient: PatientDto,
    pub site: SiteDto,
    pub assigned_vehicle_id: Option<String>,
    pub reported_at: String,
    pub transport_started_at: Option<String>,
    pub arrived_hospital_at: Option<String>,
    pub vital_signs: Vec<VitalDto>,
    pub treatments: Vec<TreatmentDto>,
}

impl From<Incident> for IncidentDto {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            status: incident.status.to_string(),
            priority: incident.priority.to_string(),
            incident_type: incident.incident_type,
            caller: incident.caller.into(),
            patient: incident.patient.into(),
            site: incident.site.into(),
            assigned_vehicle_id: incident.assigned_vehicle_id,
            reported_at: incident.reported_at.to_rfc3339(),
            transport_started_at: incident.transport_started_at.map(|t| t.to_rfc3339()),
            arrived_hospital_at: incident.arrived_hospital_at.map(|t| t.to_rfc3339()),
            vital_signs: incident.vital_signs.into_iter().map(Into::into).collect(),
            treatments: incident.treatments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListIncidentsRes {
    pub incidents: Vec<IncidentDto>,
}

/// Request binding a reported incident to an available vehicle.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct DispatchReq {
    pub incident_id: String,
    pub vehicle_id: String,
}

/// Request advancing an incident's lifecycle status.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct AdvanceReq {
    pub next_status: String,
}

/// Field vitals submission.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct VitalReq {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub pain_scale: Option<u8>,
}

impl From<VitalReq> for VitalInput {
    fn from(req: VitalReq) -> Self {
        Self {
            blood_pressure: req.blood_pressure,
            heart_rate: req.heart_rate,
            oxygen_saturation: req.oxygen_saturation,
            pain_scale: req.pain_scale,
        }
    }
}

/// Administered-treatment submission.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct TreatmentReq {
    pub treatment: String,
    pub notes: Option<String>,
}

impl From<TreatmentReq> for TreatmentInput {
    fn from(req: TreatmentReq) -> Self {
        Self {
            treatment: req.treatment,
            notes: req.notes,
        }
    }
}

// ============================================================================
// VEHICLES
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CrewMemberDto {
    pub staff_id: String,
    pub name: String,
    pub role: String,
}

impl From<CrewMember> for CrewMemberDto {
    fn from(member: CrewMember) -> Self {
        Self {
            staff_id: member.staff_id,
            name: member.name,
            role: crew_role_str(member.role).to_owned(),
        }
    }
}

impl CrewMemberDto {
    fn into_member(self) -> DispatchResult<CrewMember> {
        Ok(CrewMember {
            staff_id: self.staff_id,
            name: self.name,
            role: parse_crew_role(&self.role)?,
        })
    }
}

fn crew_role_str(role: CrewRole) -> &'static str {
    match role {
        CrewRole::Driver => "driver",
        CrewRole::Paramedic => "paramedic",
        CrewRole::Doctor => "doctor",
        CrewRole::Nurse => "nurse",
    }
}

fn parse_crew_role(s: &str) -> DispatchResult<CrewRole> {
    match s.trim() {
        "driver" => Ok(CrewRole::Driver),
        "paramedic" => Ok(CrewRole::Paramedic),
        "doctor" => Ok(CrewRole::Doctor),
        "nurse" => Ok(CrewRole::Nurse),
        other => Err(DispatchError::Validation(format!(
            "unknown crew role: '{other}'"
        ))),
    }
}

/// Fleet registration request.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct RegisterVehicleReq {
    pub id: String,
    pub call_sign: String,
    pub vehicle_number: String,
    pub base_station: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub crew: Vec<CrewMemberDto>,
}

impl RegisterVehicleReq {
    /// Convert to the core registration input, parsing enumerated strings.
    ///
    /// # Errors
    ///
    /// `DispatchError::Validation` for an unknown vehicle type or crew role.
    pub fn into_registration(self) -> DispatchResult<VehicleRegistration> {
        Ok(VehicleRegistration {
            id: self.id,
            call_sign: self.call_sign,
            vehicle_number: self.vehicle_number,
            base_station: self.base_station,
            vehicle_type: self.vehicle_type.parse()?,
            crew: self
                .crew
                .into_iter()
                .map(CrewMemberDto::into_member)
                .collect::<DispatchResult<Vec<_>>>()?,
        })
    }
}

/// Manual fleet status toggle.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct SetVehicleStatusReq {
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub recorded_at: String,
}

impl From<LocationSample> for LocationDto {
    fn from(sample: LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            address: sample.address,
            recorded_at: sample.recorded_at.to_rfc3339(),
        }
    }
}

/// A full vehicle record on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VehicleDto {
    pub id: String,
    pub call_sign: String,
    pub vehicle_number: String,
    pub base_station: String,
    pub vehicle_type: String,
    pub status: String,
    pub crew: Vec<CrewMemberDto>,
    pub current_location: Option<LocationDto>,
    pub current_incident_id: Option<String>,
}

impl From<Vehicle> for VehicleDto {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            call_sign: vehicle.call_sign,
            vehicle_number: vehicle.vehicle_number,
            base_station: vehicle.base_station,
            vehicle_type: vehicle.vehicle_type.to_string(),
            status: vehicle.status.to_string(),
            crew: vehicle.crew.into_iter().map(Into::into).collect(),
            current_location: vehicle.current_location.map(Into::into),
            current_incident_id: vehicle.current_incident_id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListVehiclesRes {
    pub vehicles: Vec<VehicleDto>,
}

/// Driver-app position push.
///
/// `recorded_at` is the sample's own timestamp; when omitted, receipt time
/// is used. Samples older than the stored one are dropped, not errors.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct PushLocationReq {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub recorded_at: Option<String>,
}

impl PushLocationReq {
    /// Convert to a core sample, parsing the optional RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// `DispatchError::Validation` for coordinates outside their ranges or
    /// an unparsable timestamp.
    pub fn into_sample(self, received_at: DateTime<Utc>) -> DispatchResult<LocationSample> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DispatchError::Validation(format!(
                "latitude {} is out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DispatchError::Validation(format!(
                "longitude {} is out of range",
                self.longitude
            )));
        }

        let recorded_at = match self.recorded_at.filter(|t| !t.trim().is_empty()) {
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|e| DispatchError::Validation(format!("recorded_at: {e}")))?
                .with_timezone(&Utc),
            None => received_at,
        };

        Ok(LocationSample {
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            recorded_at,
        })
    }
}

/// Response to a position push.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PositionRes {
    pub vehicle: VehicleDto,
    /// Advisory: the stored sample is older than the configured threshold.
    pub stale: bool,
    /// Heuristic seconds to arrival, present only while transporting.
    pub eta_seconds: Option<i64>,
}

impl PositionRes {
    pub fn new(report: PositionReport, eta_seconds: Option<i64>) -> Self {
        Self {
            vehicle: report.vehicle.into(),
            stale: report.stale,
            eta_seconds,
        }
    }
}

// ============================================================================
// ER HANDOFF
// ============================================================================

/// ER acknowledgment request.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct AcknowledgeReq {
    pub incident_id: String,
}

/// A recorded handoff.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HandoffRes {
    pub id: String,
    pub incident_id: String,
    pub acknowledged_by: String,
    pub acknowledged_at: String,
}

impl From<ErHandoff> for HandoffRes {
    fn from(handoff: ErHandoff) -> Self {
        Self {
            id: handoff.id.to_string(),
            incident_id: handoff.incident_id,
            acknowledged_by: handoff.acknowledged_by,
            acknowledged_at: handoff.acknowledged_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_req_parses_priority() {
        let req = ReportIncidentReq {
            priority: Some("critical".into()),
            caller_name: "A".into(),
            caller_phone: "555".into(),
            patient_condition: "chest pain".into(),
            address: "123 Main St".into(),
            ..ReportIncidentReq::default()
        };
        let report = req.into_report().expect("valid");
        assert_eq!(report.priority, Some(ems_core::Priority::Critical));

        let bad = ReportIncidentReq {
            priority: Some("urgent".into()),
            ..ReportIncidentReq::default()
        };
        assert!(bad.into_report().is_err());
    }

    #[test]
    fn push_location_validates_ranges_and_timestamp() {
        let now = Utc::now();
        let req = PushLocationReq {
            latitude: 12.97,
            longitude: 77.59,
            address: None,
            recorded_at: Some("2026-08-30T10:00:00Z".into()),
        };
        let sample = req.into_sample(now).expect("valid sample");
        assert_eq!(sample.recorded_at.to_rfc3339(), "2026-08-30T10:00:00+00:00");

        let bad_lat = PushLocationReq {
            latitude: 95.0,
            longitude: 0.0,
            address: None,
            recorded_at: None,
        };
        assert!(bad_lat.into_sample(now).is_err());

        let bad_ts = PushLocationReq {
            latitude: 0.0,
            longitude: 0.0,
            address: None,
            recorded_at: Some("yesterday".into()),
        };
        assert!(bad_ts.into_sample(now).is_err());

        let defaulted = PushLocationReq {
            latitude: 0.0,
            longitude: 0.0,
            address: None,
            recorded_at: None,
        };
        assert_eq!(defaulted.into_sample(now).unwrap().recorded_at, now);
    }

    #[test]
    fn incident_dto_json_field_names_are_stable() {
        let dto = IncidentDto {
            id: "EMG-20260830-0042".into(),
            status: "transporting".into(),
            priority: "high".into(),
            incident_type: Some("cardiac".into()),
            caller: CallerDto {
                name: "Ravi".into(),
                phone: "+91 98450 00000".into(),
                relation: None,
            },
            patient: PatientDto {
                name: Some("Meera".into()),
                age: Some(62),
                gender: None,
                condition: "chest pain".into(),
                chief_complaint: None,
            },
            site: SiteDto {
                address: "12 MG Road".into(),
                landmark: Some("opposite metro exit".into()),
            },
            assigned_vehicle_id: Some("AMB-01".into()),
            reported_at: "2026-08-30T10:00:00+00:00".into(),
            transport_started_at: Some("2026-08-30T10:25:00+00:00".into()),
            arrived_hospital_at: None,
            vital_signs: vec![],
            treatments: vec![],
        };

        let value = serde_json::to_value(&dto).expect("serializes");
        assert_eq!(value["id"], "EMG-20260830-0042");
        assert_eq!(value["status"], "transporting");
        assert_eq!(value["assigned_vehicle_id"], "AMB-01");
        assert_eq!(value["site"]["landmark"], "opposite metro exit");
        assert!(value["arrived_hospital_at"].is_null());

        let back: IncidentDto = serde_json::from_value(value).expect("deserializes");
        assert_eq!(back.caller.phone, "+91 98450 00000");
        assert_eq!(back.patient.age, Some(62));
    }

    #[test]
    fn error_kinds_are_stable_strings() {
        let err = DispatchError::Conflict("taken".into());
        let body = ErrorRes::from(&err);
        assert_eq!(body.error, "conflict");
        assert!(body.message.contains("taken"));
    }

    #[test]
    fn vehicle_registration_round_trips_enums() {
        let req = RegisterVehicleReq {
            id: "AMB-01".into(),
            call_sign: "Rescue 1".into(),
            vehicle_number: "KA-01-7788".into(),
            base_station: "Central".into(),
            vehicle_type: "mobile_icu".into(),
            crew: vec![CrewMemberDto {
                staff_id: "s-1".into(),
                name: "Asha".into(),
                role: "paramedic".into(),
            }],
        };
        let registration = req.into_registration().expect("valid");
        assert_eq!(registration.vehicle_type, ems_core::VehicleType::MobileIcu);
        assert_eq!(registration.crew.len(), 1);

        let bad = RegisterVehicleReq {
            id: "AMB-02".into(),
            call_sign: "Rescue 2".into(),
            vehicle_number: "KA-01-7789".into(),
            base_station: "North".into(),
            vehicle_type: "helicopter".into(),
            crew: vec![],
        };
        assert!(bad.into_registration().is_err());
    }
}
