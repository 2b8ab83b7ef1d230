//! Actor-context parsing.
//!
//! Authentication is an external collaborator; what reaches this service is
//! a staff id and role established upstream (headers here, standing in for
//! the session layer). This module turns those raw strings into a core
//! [`Actor`] without touching any transport type, so the parsing is shared
//! and testable on its own.

use ems_core::{Actor, DispatchError, DispatchResult, Role};

/// Header carrying the authenticated staff id.
pub const STAFF_ID_HEADER: &str = "x-staff-id";
/// Header carrying the authenticated staff role.
pub const STAFF_ROLE_HEADER: &str = "x-staff-role";
/// Optional header naming the vehicle the actor is crewed on.
pub const VEHICLE_ID_HEADER: &str = "x-vehicle-id";

/// Build an [`Actor`] from raw header values.
///
/// # Errors
///
/// Returns `DispatchError::Validation` when the staff id is missing/blank or
/// the role is missing or unknown. The API layer maps this to 401.
pub fn actor_from_headers(
    staff_id: Option<&str>,
    role: Option<&str>,
    vehicle_id: Option<&str>,
) -> DispatchResult<Actor> {
    let staff_id = staff_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DispatchError::Validation(format!("missing {STAFF_ID_HEADER} header"))
        })?;

    let role: Role = role
        .ok_or_else(|| DispatchError::Validation(format!("missing {STAFF_ROLE_HEADER} header")))?
        .parse()?;

    let mut actor = Actor::new(staff_id, role);
    if let Some(vehicle_id) = vehicle_id.map(str::trim).filter(|s| !s.is_empty()) {
        actor = actor.with_vehicle(vehicle_id);
    }
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_context() {
        let actor = actor_from_headers(Some("s-42"), Some("driver"), Some("AMB-01"))
            .expect("valid context");
        assert_eq!(actor.staff_id, "s-42");
        assert_eq!(actor.role, Role::Driver);
        assert_eq!(actor.vehicle_id.as_deref(), Some("AMB-01"));
    }

    #[test]
    fn missing_or_blank_pieces_are_rejected() {
        assert!(actor_from_headers(None, Some("nurse"), None).is_err());
        assert!(actor_from_headers(Some("  "), Some("nurse"), None).is_err());
        assert!(actor_from_headers(Some("s-1"), None, None).is_err());
        assert!(actor_from_headers(Some("s-1"), Some("janitor"), None).is_err());
    }

    #[test]
    fn vehicle_header_is_optional() {
        let actor = actor_from_headers(Some("s-1"), Some("nurse"), None).expect("valid");
        assert!(actor.vehicle_id.is_none());
    }
}
