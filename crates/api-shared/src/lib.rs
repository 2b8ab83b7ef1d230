//! # API Shared
//!
//! Shared definitions for the dispatch API surfaces.
//!
//! Contains:
//! - JSON wire models (`dto` module) with OpenAPI schemas
//! - The shared `HealthService`
//! - Actor-context parsing (usable by any transport)
//!
//! The wire format is plain JSON; statuses, priorities, and roles travel as
//! their canonical snake/kebab-case strings and are validated at the
//! boundary.

pub mod actor;
pub mod dto;
pub mod health;

pub use health::HealthService;
