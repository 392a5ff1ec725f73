//! Event use-case service.
//!
//! # Responsibility
//! - Creation: resolve the type tag, validate the payload, then hand the
//!   typed payload to the repository's atomic insert.
//! - Retrieval: assemble envelope + extension into one `Event`, strictly for
//!   single fetches and best-effort for listings.
//!
//! # Invariants
//! - Nothing is written when tag resolution or validation fails.
//! - `get_event` reports every anomaly; `list_events` skips envelopes with an
//!   unknown tag or a missing extension row and logs each skip at `warn`.
//! - Storage failures are never skipped.

use crate::model::event::{Event, EventEnvelope, EventId, EventKind, EventPayload, NewEvent};
use crate::model::validation::PayloadViolations;
use crate::registry::{self, UnknownEventType};
use crate::repo::event_repo::{EventRepository, RepoError};
use chrono::{DateTime, Utc};
use log::{error, warn};

/// Service error taxonomy for event use-cases.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Payload failed validation for its declared type.
    #[error("{0}")]
    InvalidPayload(PayloadViolations),
    /// Type tag outside the closed set, on write or on read.
    #[error("{0}")]
    UnknownEventType(#[from] UnknownEventType),
    /// No envelope with this id.
    #[error("event not found: {0}")]
    NotFound(EventId),
    /// Envelope exists with a known tag but its extension row is missing.
    #[error("{kind} data not found for event {event_id}")]
    DataIntegrity { event_id: EventId, kind: EventKind },
    /// Persistence-layer failure.
    #[error("{0}")]
    Repo(RepoError),
}

impl From<RepoError> for EventError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(event_id) => Self::NotFound(event_id),
            RepoError::Validation(violations) => Self::InvalidPayload(violations),
            other => Self::Repo(other),
        }
    }
}

impl From<PayloadViolations> for EventError {
    fn from(value: PayloadViolations) -> Self {
        Self::InvalidPayload(value)
    }
}

/// Event service facade over repository implementations.
pub struct EventService<R: EventRepository> {
    repo: R,
}

impl<R: EventRepository> EventService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one event from an untyped request.
    ///
    /// # Contract
    /// - Unknown `event_type` fails with `UnknownEventType`.
    /// - Payload violations fail with `InvalidPayload`, naming each field.
    /// - On success envelope and extension are committed together.
    pub fn create_event(&mut self, request: &NewEvent) -> Result<EventId, EventError> {
        let spec = registry::resolve(&request.event_type).inspect_err(|_| {
            warn!(
                "event=event_create module=service status=rejected error_code=unknown_event_type"
            );
        })?;
        let payload = spec.validate(&request.data).inspect_err(|violations| {
            warn!(
                "event=event_create module=service status=rejected event_type={} error_code=invalid_payload fields={}",
                spec.tag(),
                violations.fields().join(",")
            );
        })?;

        Ok(self.repo.insert_event(request.timestamp, &payload)?)
    }

    /// Creates one event from an already-typed payload.
    pub fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        payload: &EventPayload,
    ) -> Result<EventId, EventError> {
        Ok(self.repo.insert_event(timestamp, payload)?)
    }

    /// Gets one event by id, reporting every anomaly as an error.
    pub fn get_event(&self, event_id: EventId) -> Result<Event, EventError> {
        let envelope = self
            .repo
            .get_envelope(event_id)?
            .ok_or(EventError::NotFound(event_id))?;

        self.assemble(envelope).inspect_err(|err| match err {
            EventError::DataIntegrity { event_id, kind } => error!(
                "event=event_get module=service status=error error_code=subtype_missing event_id={event_id} event_type={kind}"
            ),
            EventError::UnknownEventType(_) => error!(
                "event=event_get module=service status=error error_code=unknown_stored_type event_id={event_id}"
            ),
            _ => {}
        })
    }

    /// Lists all events, newest first.
    ///
    /// Envelopes whose tag is unknown or whose extension row is missing are
    /// left out of the result.
    pub fn list_events(&self) -> Result<Vec<Event>, EventError> {
        let envelopes = self.repo.list_envelopes()?;
        let mut events = Vec::with_capacity(envelopes.len());

        for envelope in envelopes {
            let event_id = envelope.event_id;
            match self.assemble(envelope) {
                Ok(event) => events.push(event),
                Err(EventError::UnknownEventType(_)) => warn!(
                    "event=event_list module=service status=skipped reason=unknown_stored_type event_id={event_id}"
                ),
                Err(EventError::DataIntegrity { kind, .. }) => warn!(
                    "event=event_list module=service status=skipped reason=subtype_missing event_id={event_id} event_type={kind}"
                ),
                Err(other) => return Err(other),
            }
        }

        Ok(events)
    }

    /// Deletes one event; its extension record is removed with it.
    pub fn delete_event(&mut self, event_id: EventId) -> Result<(), EventError> {
        Ok(self.repo.delete_event(event_id)?)
    }

    fn assemble(&self, envelope: EventEnvelope) -> Result<Event, EventError> {
        let spec = registry::resolve(&envelope.event_type)?;
        let payload = self
            .repo
            .load_extension(spec.kind, envelope.event_id)?
            .ok_or(EventError::DataIntegrity {
                event_id: envelope.event_id,
                kind: spec.kind,
            })?;

        Ok(Event {
            event_id: envelope.event_id,
            timestamp: envelope.timestamp,
            payload,
        })
    }
}
