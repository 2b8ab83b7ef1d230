//! REST API for the EMS dispatch coordinator.
//!
//! Thin HTTP shell over `ems-core`: handlers extract the actor context from
//! headers, convert wire models, call exactly one core operation, and map
//! the core error taxonomy onto status codes. No business rules live here.
//!
//! Status mapping: 404 `not_found`, 409 `conflict`/`invalid_transition`,
//! 422 `validation`, 403 `forbidden`, 401 missing/garbled actor context.

pub mod routes;

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::dto;
use ems_core::{config, CoreConfig, DispatchError, DispatchSystem};

/// Application state shared across REST handlers.
///
/// Holds the wired-up dispatch core; axum clones this per request, so the
/// system lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub system: Arc<DispatchSystem>,
}

impl AppState {
    pub fn new(cfg: CoreConfig) -> Self {
        Self {
            system: Arc::new(DispatchSystem::new(cfg)),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health,
        routes::report_incident,
        routes::list_incidents,
        routes::get_incident,
        routes::append_vital,
        routes::append_treatment,
        routes::dispatch_vehicle,
        routes::advance_incident,
        routes::register_vehicle,
        routes::list_vehicles,
        routes::get_vehicle,
        routes::set_vehicle_status,
        routes::push_location,
        routes::acknowledge,
        routes::er_inbound,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ErrorRes,
        dto::ReportIncidentReq,
        dto::IncidentDto,
        dto::CallerDto,
        dto::PatientDto,
        dto::SiteDto,
        dto::VitalDto,
        dto::TreatmentDto,
        dto::ListIncidentsRes,
        dto::DispatchReq,
        dto::AdvanceReq,
        dto::VitalReq,
        dto::TreatmentReq,
        dto::RegisterVehicleReq,
        dto::SetVehicleStatusReq,
        dto::CrewMemberDto,
        dto::VehicleDto,
        dto::LocationDto,
        dto::ListVehiclesRes,
        dto::PushLocationReq,
        dto::PositionRes,
        dto::AcknowledgeReq,
        dto::HandoffRes,
    ))
)]
pub struct ApiDoc;

/// Build the full dispatch API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/incidents", post(routes::report_incident))
        .route("/incidents", get(routes::list_incidents))
        .route("/incidents/:id", get(routes::get_incident))
        .route("/incidents/:id/vitals", post(routes::append_vital))
        .route("/incidents/:id/treatments", post(routes::append_treatment))
        .route("/incidents/:id/advance", post(routes::advance_incident))
        .route("/dispatch", post(routes::dispatch_vehicle))
        .route("/vehicles", post(routes::register_vehicle))
        .route("/vehicles", get(routes::list_vehicles))
        .route("/vehicles/:id", get(routes::get_vehicle))
        .route("/vehicles/:id/status", put(routes::set_vehicle_status))
        .route("/vehicles/:id/location", put(routes::push_location))
        .route("/er/acknowledge", post(routes::acknowledge))
        .route("/er/inbound", get(routes::er_inbound))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build application state from process environment.
///
/// # Environment Variables
/// - `EMS_INCIDENT_PREFIX`: incident code prefix (default: "EMG")
/// - `EMS_STALE_AFTER_SECS`: location staleness threshold (default: 120)
/// - `EMS_ASSUMED_TRANSPORT_SECS`: ETA heuristic duration (default: 1500)
///
/// # Errors
///
/// Returns an error when any value fails validation.
pub fn state_from_env() -> anyhow::Result<AppState> {
    let prefix = std::env::var("EMS_INCIDENT_PREFIX")
        .unwrap_or_else(|_| config::DEFAULT_INCIDENT_PREFIX.into());
    let stale = config::secs_from_env_value(
        std::env::var("EMS_STALE_AFTER_SECS").ok(),
        config::DEFAULT_STALE_AFTER_SECS,
    )?;
    let transport = config::secs_from_env_value(
        std::env::var("EMS_ASSUMED_TRANSPORT_SECS").ok(),
        config::DEFAULT_ASSUMED_TRANSPORT_SECS,
    )?;

    Ok(AppState::new(CoreConfig::new(prefix, stale, transport)?))
}

/// Serve the API on `addr` until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails
/// while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) type ApiError = (StatusCode, Json<dto::ErrorRes>);

/// Map a core error onto its status code and wire body.
pub(crate) fn reject(err: DispatchError) -> ApiError {
    let status = match &err {
        DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
        DispatchError::InvalidTransition(_) | DispatchError::Conflict(_) => StatusCode::CONFLICT,
        DispatchError::Forbidden { .. } => StatusCode::FORBIDDEN,
    };
    tracing::debug!(error = %err, status = %status, "request rejected");
    (status, Json(dto::ErrorRes::from(&err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_codes() {
        let (status, body) = reject(DispatchError::Conflict("taken".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");

        let (status, _) = reject(DispatchError::Validation("bad".into()));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = reject(DispatchError::not_found(
            ems_core::Entity::Vehicle,
            "AMB-09",
        ));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = reject(DispatchError::Forbidden {
            role: "dietician".into(),
            action: "dispatch".into(),
        });
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
