//! Request handlers.
//!
//! Every handler follows the same shape: extract the actor context, convert
//! the wire model, call one core operation, convert the result back. The
//! core owns all validation and state-machine rules.

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use api_shared::actor::{
    actor_from_headers, STAFF_ID_HEADER, STAFF_ROLE_HEADER, VEHICLE_ID_HEADER,
};
use api_shared::dto;
use api_shared::HealthService;
use ems_core::incident::IncidentStatus;
use ems_core::registry::{IncidentFilter, VehicleFilter};
use ems_core::vehicle::VehicleStatus;
use ems_core::{Actor, DispatchError};

use crate::{reject, ApiError, AppState};

/// Build the acting-staff context from request headers.
///
/// Missing or garbled context is 401: the caller never authenticated, as
/// opposed to 403 where an authenticated role is simply not allowed.
fn actor(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    actor_from_headers(
        header(STAFF_ID_HEADER),
        header(STAFF_ROLE_HEADER),
        header(VEHICLE_ID_HEADER),
    )
    .map_err(|err| {
        (
            StatusCode::UNAUTHORIZED,
            Json(dto::ErrorRes {
                error: "unauthenticated".into(),
                message: err.to_string(),
            }),
        )
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = dto::HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer probes.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<dto::HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/incidents",
    request_body = dto::ReportIncidentReq,
    responses(
        (status = 201, description = "Incident reported", body = dto::IncidentDto),
        (status = 401, description = "Missing actor context", body = dto::ErrorRes),
        (status = 422, description = "Validation failure", body = dto::ErrorRes)
    )
)]
/// File a new incident report.
///
/// Creates the incident in `reported` state with a generated
/// `EMG-YYYYMMDD-####` code.
#[axum::debug_handler]
pub async fn report_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::ReportIncidentReq>,
) -> Result<(StatusCode, Json<dto::IncidentDto>), ApiError> {
    let actor = actor(&headers)?;
    let report = req.into_report().map_err(reject)?;
    let incident = state
        .system
        .incidents
        .report(&actor, report)
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(incident.into())))
}

/// Query parameters for incident listings.
///
/// `status` accepts a comma-separated set; `date` is a `YYYY-MM-DD` day
/// window; `from`/`to` are RFC 3339 bounds on `reported_at`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct IncidentQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl IncidentQuery {
    fn into_filter(self) -> Result<IncidentFilter, DispatchError> {
        let mut filter = IncidentFilter::default();

        if let Some(statuses) = self.status.filter(|s| !s.trim().is_empty()) {
            filter.statuses = statuses
                .split(',')
                .map(|s| s.parse::<IncidentStatus>())
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(priority) = self.priority.filter(|p| !p.trim().is_empty()) {
            filter.priority = Some(priority.parse()?);
        }
        if let Some(date) = self.date.filter(|d| !d.trim().is_empty()) {
            let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|e| DispatchError::Validation(format!("date: {e}")))?;
            let start = day
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
                .and_utc();
            filter.from = Some(start);
            filter.to = Some(start + chrono::Duration::days(1));
        }
        if let Some(from) = self.from.filter(|f| !f.trim().is_empty()) {
            filter.from = Some(parse_rfc3339("from", &from)?);
        }
        if let Some(to) = self.to.filter(|t| !t.trim().is_empty()) {
            filter.to = Some(parse_rfc3339("to", &to)?);
        }
        Ok(filter)
    }
}

fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, DispatchError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DispatchError::Validation(format!("{field}: {e}")))
}

#[utoipa::path(
    get,
    path = "/incidents",
    params(IncidentQuery),
    responses(
        (status = 200, description = "Matching incidents, newest first", body = dto::ListIncidentsRes),
        (status = 401, description = "Missing actor context", body = dto::ErrorRes),
        (status = 422, description = "Bad filter value", body = dto::ErrorRes)
    )
)]
/// List incidents, filtered and ordered by report time descending.
#[axum::debug_handler]
pub async fn list_incidents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IncidentQuery>,
) -> Result<Json<dto::ListIncidentsRes>, ApiError> {
    actor(&headers)?;
    let filter = query.into_filter().map_err(reject)?;
    let incidents = state
        .system
        .incidents
        .list(&filter)
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(dto::ListIncidentsRes { incidents }))
}

#[utoipa::path(
    get,
    path = "/incidents/{id}",
    params(("id" = String, Path, description = "Incident code")),
    responses(
        (status = 200, description = "The incident", body = dto::IncidentDto),
        (status = 404, description = "Unknown incident", body = dto::ErrorRes)
    )
)]
/// Fetch a single incident by code.
#[axum::debug_handler]
pub async fn get_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<dto::IncidentDto>, ApiError> {
    actor(&headers)?;
    let incident = state.system.incidents.get(&id).map_err(reject)?;
    Ok(Json(incident.into()))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/vitals",
    params(("id" = String, Path, description = "Incident code")),
    request_body = dto::VitalReq,
    responses(
        (status = 200, description = "Reading appended", body = dto::IncidentDto),
        (status = 403, description = "Role may not record vitals", body = dto::ErrorRes),
        (status = 404, description = "Unknown incident", body = dto::ErrorRes)
    )
)]
/// Append a vital-signs reading. Never changes the incident status.
#[axum::debug_handler]
pub async fn append_vital(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<dto::VitalReq>,
) -> Result<Json<dto::IncidentDto>, ApiError> {
    let actor = actor(&headers)?;
    let incident = state
        .system
        .incidents
        .append_vital(&actor, &id, req.into())
        .map_err(reject)?;
    Ok(Json(incident.into()))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/treatments",
    params(("id" = String, Path, description = "Incident code")),
    request_body = dto::TreatmentReq,
    responses(
        (status = 200, description = "Treatment appended", body = dto::IncidentDto),
        (status = 403, description = "Role may not record treatments", body = dto::ErrorRes),
        (status = 404, description = "Unknown incident", body = dto::ErrorRes)
    )
)]
/// Append an administered-treatment record. Never changes the incident
/// status.
#[axum::debug_handler]
pub async fn append_treatment(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<dto::TreatmentReq>,
) -> Result<Json<dto::IncidentDto>, ApiError> {
    let actor = actor(&headers)?;
    let incident = state
        .system
        .incidents
        .append_treatment(&actor, &id, req.into())
        .map_err(reject)?;
    Ok(Json(incident.into()))
}

#[utoipa::path(
    post,
    path = "/dispatch",
    request_body = dto::DispatchReq,
    responses(
        (status = 200, description = "Vehicle bound to incident", body = dto::IncidentDto),
        (status = 403, description = "Role may not dispatch", body = dto::ErrorRes),
        (status = 404, description = "Unknown incident or vehicle", body = dto::ErrorRes),
        (status = 409, description = "Incident or vehicle no longer eligible", body = dto::ErrorRes)
    )
)]
/// Bind an available vehicle to a reported incident.
///
/// Exactly one of several racing dispatchers wins; the rest receive a 409
/// so the UI can offer another vehicle.
#[axum::debug_handler]
pub async fn dispatch_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::DispatchReq>,
) -> Result<Json<dto::IncidentDto>, ApiError> {
    let actor = actor(&headers)?;
    let incident = state
        .system
        .coordinator
        .dispatch(&actor, &req.incident_id, &req.vehicle_id)
        .map_err(reject)?;
    Ok(Json(incident.into()))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/advance",
    params(("id" = String, Path, description = "Incident code")),
    request_body = dto::AdvanceReq,
    responses(
        (status = 200, description = "Incident advanced", body = dto::IncidentDto),
        (status = 403, description = "Role may not advance this incident", body = dto::ErrorRes),
        (status = 404, description = "Unknown incident", body = dto::ErrorRes),
        (status = 409, description = "Illegal transition or lost race", body = dto::ErrorRes),
        (status = 422, description = "Unknown status value", body = dto::ErrorRes)
    )
)]
/// Advance an incident (and its bound vehicle) along the response
/// lifecycle.
#[axum::debug_handler]
pub async fn advance_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<dto::AdvanceReq>,
) -> Result<Json<dto::IncidentDto>, ApiError> {
    let actor = actor(&headers)?;
    let next: IncidentStatus = req.next_status.parse().map_err(reject)?;
    let incident = state
        .system
        .coordinator
        .advance(&actor, &id, next)
        .map_err(reject)?;
    Ok(Json(incident.into()))
}

#[utoipa::path(
    post,
    path = "/vehicles",
    request_body = dto::RegisterVehicleReq,
    responses(
        (status = 201, description = "Vehicle registered", body = dto::VehicleDto),
        (status = 403, description = "Role may not register vehicles", body = dto::ErrorRes),
        (status = 409, description = "Vehicle id already registered", body = dto::ErrorRes),
        (status = 422, description = "Validation failure", body = dto::ErrorRes)
    )
)]
/// Register a new ambulance (fleet administration).
#[axum::debug_handler]
pub async fn register_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::RegisterVehicleReq>,
) -> Result<(StatusCode, Json<dto::VehicleDto>), ApiError> {
    let actor = actor(&headers)?;
    let registration = req.into_registration().map_err(reject)?;
    let vehicle = state
        .system
        .vehicles
        .register(&actor, registration)
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(vehicle.into())))
}

/// Query parameters for vehicle listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct VehicleQuery {
    pub status: Option<String>,
    pub base_station: Option<String>,
}

#[utoipa::path(
    get,
    path = "/vehicles",
    params(VehicleQuery),
    responses(
        (status = 200, description = "Matching vehicles", body = dto::ListVehiclesRes),
        (status = 422, description = "Bad filter value", body = dto::ErrorRes)
    )
)]
/// List vehicles, optionally filtered by status or base station.
#[axum::debug_handler]
pub async fn list_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VehicleQuery>,
) -> Result<Json<dto::ListVehiclesRes>, ApiError> {
    actor(&headers)?;
    let status = match query.status.filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(raw.parse::<VehicleStatus>().map_err(reject)?),
        None => None,
    };
    let filter = VehicleFilter {
        status,
        base_station: query.base_station.filter(|b| !b.trim().is_empty()),
    };
    let vehicles = state
        .system
        .vehicles
        .list(&filter)
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(dto::ListVehiclesRes { vehicles }))
}

#[utoipa::path(
    get,
    path = "/vehicles/{id}",
    params(("id" = String, Path, description = "Vehicle id")),
    responses(
        (status = 200, description = "The vehicle", body = dto::VehicleDto),
        (status = 404, description = "Unknown vehicle", body = dto::ErrorRes)
    )
)]
/// Fetch a single vehicle by id.
#[axum::debug_handler]
pub async fn get_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<dto::VehicleDto>, ApiError> {
    actor(&headers)?;
    let vehicle = state.system.vehicles.get(&id).map_err(reject)?;
    Ok(Json(vehicle.into()))
}

#[utoipa::path(
    put,
    path = "/vehicles/{id}/status",
    params(("id" = String, Path, description = "Vehicle id")),
    request_body = dto::SetVehicleStatusReq,
    responses(
        (status = 200, description = "Status updated", body = dto::VehicleDto),
        (status = 403, description = "Role may not change fleet status", body = dto::ErrorRes),
        (status = 404, description = "Unknown vehicle", body = dto::ErrorRes),
        (status = 409, description = "Vehicle is bound or status is dispatch-only", body = dto::ErrorRes)
    )
)]
/// Manual fleet toggle: `available`, `out_of_service`, `maintenance`.
///
/// The active-response statuses are rejected here; they can only be reached
/// through `/dispatch` and `/incidents/{id}/advance`.
#[axum::debug_handler]
pub async fn set_vehicle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<dto::SetVehicleStatusReq>,
) -> Result<Json<dto::VehicleDto>, ApiError> {
    let actor = actor(&headers)?;
    let status: VehicleStatus = req.status.parse().map_err(reject)?;
    let vehicle = state
        .system
        .vehicles
        .set_status(&actor, &id, status)
        .map_err(reject)?;
    Ok(Json(vehicle.into()))
}

#[utoipa::path(
    put,
    path = "/vehicles/{id}/location",
    params(("id" = String, Path, description = "Vehicle id")),
    request_body = dto::PushLocationReq,
    responses(
        (status = 200, description = "Position recorded", body = dto::PositionRes),
        (status = 403, description = "Crew may only push for their own vehicle", body = dto::ErrorRes),
        (status = 404, description = "Unknown vehicle", body = dto::ErrorRes),
        (status = 422, description = "Bad coordinates or timestamp", body = dto::ErrorRes)
    )
)]
/// Record a position sample from the driver app.
///
/// The response carries the advisory staleness flag and, while the vehicle
/// is transporting, the heuristic ETA.
#[axum::debug_handler]
pub async fn push_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<dto::PushLocationReq>,
) -> Result<Json<dto::PositionRes>, ApiError> {
    let actor = actor(&headers)?;
    let now = Utc::now();
    let sample = req.into_sample(now).map_err(reject)?;
    let report = state
        .system
        .locations
        .push(&actor, &id, sample)
        .map_err(reject)?;

    let eta_seconds = match (
        report.vehicle.current_incident_id.clone(),
        report.vehicle.status,
    ) {
        (Some(incident_id), VehicleStatus::Transporting) => state
            .system
            .incidents
            .get(&incident_id)
            .ok()
            .and_then(|incident| state.system.locations.estimate_arrival(&incident, now))
            .map(|eta| eta.num_seconds()),
        _ => None,
    };
    Ok(Json(dto::PositionRes::new(report, eta_seconds)))
}

#[utoipa::path(
    post,
    path = "/er/acknowledge",
    request_body = dto::AcknowledgeReq,
    responses(
        (status = 200, description = "Handoff recorded (or already recorded)", body = dto::HandoffRes),
        (status = 403, description = "Role may not acknowledge", body = dto::ErrorRes),
        (status = 404, description = "Unknown incident", body = dto::ErrorRes)
    )
)]
/// Acknowledge custody of an inbound patient. Idempotent: repeats return
/// the original handoff record.
#[axum::debug_handler]
pub async fn acknowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::AcknowledgeReq>,
) -> Result<Json<dto::HandoffRes>, ApiError> {
    let actor = actor(&headers)?;
    let handoff = state
        .system
        .handoffs
        .acknowledge(&actor, &req.incident_id)
        .map_err(reject)?;
    Ok(Json(handoff.into()))
}

#[utoipa::path(
    get,
    path = "/er/inbound",
    responses(
        (status = 200, description = "Incidents currently transporting", body = dto::ListIncidentsRes)
    )
)]
/// The ER arrivals board: incidents currently in `transporting`.
#[axum::debug_handler]
pub async fn er_inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<dto::ListIncidentsRes>, ApiError> {
    actor(&headers)?;
    let incidents = state
        .system
        .inbound()
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(dto::ListIncidentsRes { incidents }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_query_parses_status_sets_and_dates() {
        let filter = IncidentQuery {
            status: Some("reported,dispatched".into()),
            priority: Some("critical".into()),
            date: Some("2026-08-30".into()),
            ..IncidentQuery::default()
        }
        .into_filter()
        .expect("valid query");

        assert_eq!(
            filter.statuses,
            vec![IncidentStatus::Reported, IncidentStatus::Dispatched]
        );
        assert_eq!(filter.priority, Some(ems_core::Priority::Critical));
        let from = filter.from.expect("day start");
        let to = filter.to.expect("day end");
        assert_eq!((to - from), chrono::Duration::days(1));
    }

    #[test]
    fn incident_query_rejects_unknown_values() {
        let err = IncidentQuery {
            status: Some("pending".into()),
            ..IncidentQuery::default()
        }
        .into_filter();
        assert!(matches!(err, Err(DispatchError::Validation(_))));

        let err = IncidentQuery {
            date: Some("30/08/2026".into()),
            ..IncidentQuery::default()
        }
        .into_filter();
        assert!(matches!(err, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn missing_actor_headers_are_unauthenticated() {
        let headers = HeaderMap::new();
        let err = actor(&headers).expect_err("no context");
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        assert_eq!(err.1 .0.error, "unauthenticated");
    }

    #[test]
    fn full_actor_headers_parse() {
        let mut headers = HeaderMap::new();
        headers.insert(STAFF_ID_HEADER, "s-42".parse().unwrap());
        headers.insert(STAFF_ROLE_HEADER, "driver".parse().unwrap());
        headers.insert(VEHICLE_ID_HEADER, "AMB-01".parse().unwrap());
        let actor = actor(&headers).expect("valid context");
        assert_eq!(actor.staff_id, "s-42");
        assert_eq!(actor.vehicle_id.as_deref(), Some("AMB-01"));
    }
}
