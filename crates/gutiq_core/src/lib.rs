//! Core domain logic for GutIQ health-event tracking.
//! This crate is the single source of truth for event invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{
    Event, EventEnvelope, EventId, EventKind, EventPayload, ExerciseData, MealData, NewEvent,
    Severity, SymptomData,
};
pub use model::validation::{FieldViolation, PayloadViolations};
pub use registry::{EventTypeSpec, UnknownEventType};
pub use repo::event_repo::{EventRepository, RepoError, RepoResult, SqliteEventRepository};
pub use service::event_service::{EventError, EventService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
