//! Event envelope and typed payload model.
//!
//! # Responsibility
//! - Define the closed set of event categories and their payload shapes.
//! - Provide the unified read model returned by retrieval paths.
//!
//! # Invariants
//! - `event_id` is generated once at creation and never reused.
//! - Every event carries exactly one payload, and the payload variant is the
//!   event's type tag.
//! - Wire shape is `{event_id, timestamp, event_type, data}`.

use crate::model::validation::{self, PayloadViolations};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier shared by an envelope and its extension record.
pub type EventId = Uuid;

/// Closed set of event categories (the type tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Meal,
    Exercise,
    Symptom,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Meal, EventKind::Exercise, EventKind::Symptom];

    /// Storage and wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meal => "meal",
            Self::Exercise => "exercise",
            Self::Symptom => "symptom",
        }
    }

    /// Parses an exact lowercase tag.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symptom severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Mild, Severity::Moderate, Severity::Severe];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|severity| severity.as_str() == value)
    }
}

/// Meal payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealData {
    /// Food item names, at least one.
    pub foods: Vec<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fats: Option<f64>,
}

impl MealData {
    /// Meal with foods only and no nutrition measures.
    pub fn with_foods<I, S>(foods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            foods: foods.into_iter().map(Into::into).collect(),
            calories: None,
            protein: None,
            carbohydrates: None,
            fats: None,
        }
    }
}

/// Exercise payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseData {
    /// Free-text category (running, lifting, ...). Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Strictly positive.
    pub duration_minutes: f64,
}

/// Symptom payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomData {
    pub description: String,
    pub severity: Severity,
}

/// Type-specific payload of an event, tagged by its category.
///
/// Serialized adjacently tagged so that one value renders as
/// `{"event_type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Meal(MealData),
    Exercise(ExerciseData),
    Symptom(SymptomData),
}

impl EventPayload {
    /// Type tag implied by the payload variant.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Meal(_) => EventKind::Meal,
            Self::Exercise(_) => EventKind::Exercise,
            Self::Symptom(_) => EventKind::Symptom,
        }
    }

    /// Checks field constraints on an already-typed payload.
    ///
    /// Same rules as the JSON validators, minus shape checks that the type
    /// system already guarantees.
    pub fn validate(&self) -> Result<(), PayloadViolations> {
        let violations = match self {
            Self::Meal(meal) => validation::check_meal(meal),
            Self::Exercise(exercise) => validation::check_exercise(exercise),
            Self::Symptom(symptom) => validation::check_symptom(symptom),
        };
        PayloadViolations::into_result(self.kind(), violations)
    }
}

/// Envelope row as stored, before registry dispatch.
///
/// `event_type` stays raw text so that an unrecognized stored tag can be
/// reported rather than failing row decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
}

/// Create request: `(timestamp, typeTag, payload)` before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Unified read model: envelope fields plus the typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
