//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services. The intent is to avoid reading process-wide environment
//! variables during request handling, which can lead to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.

use crate::error::{DispatchError, DispatchResult};
use chrono::Duration;

/// Default prefix for generated incident codes (`EMG-YYYYMMDD-####`).
pub const DEFAULT_INCIDENT_PREFIX: &str = "EMG";

/// Default age after which a vehicle position is flagged stale (advisory only).
pub const DEFAULT_STALE_AFTER_SECS: i64 = 120;

/// Default assumed transport duration used by the ETA heuristic.
pub const DEFAULT_ASSUMED_TRANSPORT_SECS: i64 = 25 * 60;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    incident_prefix: String,
    stale_after: Duration,
    assumed_transport: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Validation` if the prefix is empty or not
    /// plain ASCII alphanumeric text, or if either duration is not positive.
    pub fn new(
        incident_prefix: String,
        stale_after_secs: i64,
        assumed_transport_secs: i64,
    ) -> DispatchResult<Self> {
        let prefix = incident_prefix.trim().to_owned();
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DispatchError::Validation(
                "incident prefix must be non-empty ASCII alphanumeric text".into(),
            ));
        }
        if stale_after_secs <= 0 {
            return Err(DispatchError::Validation(
                "stale-after threshold must be positive".into(),
            ));
        }
        if assumed_transport_secs <= 0 {
            return Err(DispatchError::Validation(
                "assumed transport duration must be positive".into(),
            ));
        }

        Ok(Self {
            incident_prefix: prefix,
            stale_after: Duration::seconds(stale_after_secs),
            assumed_transport: Duration::seconds(assumed_transport_secs),
        })
    }

    pub fn incident_prefix(&self) -> &str {
        &self.incident_prefix
    }

    /// Age beyond which a location sample is surfaced to dispatch UIs as
    /// stale. Advisory only, never blocking.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Fixed assumed transport duration for the ETA heuristic.
    pub fn assumed_transport(&self) -> Duration {
        self.assumed_transport
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            incident_prefix: DEFAULT_INCIDENT_PREFIX.to_owned(),
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
            assumed_transport: Duration::seconds(DEFAULT_ASSUMED_TRANSPORT_SECS),
        }
    }
}

/// Parse a positive seconds value from an optional env string.
///
/// If `value` is `None` or empty/whitespace, returns `default`.
pub fn secs_from_env_value(value: Option<String>, default: i64) -> DispatchResult<i64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(raw) => {
            let parsed: i64 = raw.parse().map_err(|_| {
                DispatchError::Validation(format!("'{raw}' is not a whole number of seconds"))
            })?;
            if parsed <= 0 {
                return Err(DispatchError::Validation(format!(
                    "'{raw}' must be a positive number of seconds"
                )));
            }
            Ok(parsed)
        }
    }
}
