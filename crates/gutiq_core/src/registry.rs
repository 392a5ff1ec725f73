//! Event type registry.
//!
//! # Responsibility
//! - Map each type tag to its payload validator and extension store.
//! - Serve as the single dispatch point for the create, fetch and list paths.
//!
//! # Invariants
//! - Exhaustive over `EventKind`: every kind has exactly one entry.
//! - Entries are static; the registry has no runtime registration.

use crate::model::event::{EventKind, EventPayload};
use crate::model::validation::{self, PayloadViolations};
use crate::repo::extension_store::{ExerciseStore, ExtensionStore, MealStore, SymptomStore};
use serde_json::Value;
use std::fmt::{Debug, Formatter};

/// Validator turning a JSON payload into a typed one.
pub type PayloadValidator = fn(&Value) -> Result<EventPayload, PayloadViolations>;

/// Tag outside the closed set of event kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type `{0}`")]
pub struct UnknownEventType(pub String);

/// Registry entry for one event kind.
pub struct EventTypeSpec {
    pub kind: EventKind,
    validator: PayloadValidator,
    store: &'static dyn ExtensionStore,
}

impl EventTypeSpec {
    /// Storage and wire tag.
    pub fn tag(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Validates an untyped payload for this kind.
    pub fn validate(&self, data: &Value) -> Result<EventPayload, PayloadViolations> {
        (self.validator)(data)
    }

    /// Extension store holding this kind's records.
    pub fn store(&self) -> &'static dyn ExtensionStore {
        self.store
    }
}

impl Debug for EventTypeSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeSpec")
            .field("kind", &self.kind)
            .field("table", &self.store.table())
            .finish()
    }
}

static MEAL: EventTypeSpec = EventTypeSpec {
    kind: EventKind::Meal,
    validator: validation::validate_meal,
    store: &MealStore,
};

static EXERCISE: EventTypeSpec = EventTypeSpec {
    kind: EventKind::Exercise,
    validator: validation::validate_exercise,
    store: &ExerciseStore,
};

static SYMPTOM: EventTypeSpec = EventTypeSpec {
    kind: EventKind::Symptom,
    validator: validation::validate_symptom,
    store: &SymptomStore,
};

/// Returns the entry for a known kind.
pub fn spec_for(kind: EventKind) -> &'static EventTypeSpec {
    match kind {
        EventKind::Meal => &MEAL,
        EventKind::Exercise => &EXERCISE,
        EventKind::Symptom => &SYMPTOM,
    }
}

/// Resolves a raw type tag, as received from a caller or read from storage.
pub fn resolve(tag: &str) -> Result<&'static EventTypeSpec, UnknownEventType> {
    EventKind::parse(tag)
        .map(spec_for)
        .ok_or_else(|| UnknownEventType(tag.to_string()))
}

/// All registry entries in `EventKind::ALL` order.
pub fn all() -> [&'static EventTypeSpec; 3] {
    EventKind::ALL.map(spec_for)
}
