//! Payload validation for each event category.
//!
//! # Responsibility
//! - Turn an untyped JSON payload into a normalized `EventPayload`.
//! - Report every violated field, not only the first one.
//!
//! # Invariants
//! - Validation is pure: no I/O, no logging, no storage access.
//! - Violations are ordered by the shape's declared field order.
//! - Keys outside the shape are ignored and never reach the typed payload.
//! - Field names in violations use wire names (`type`, not `kind`).

use crate::model::event::{EventKind, EventPayload, ExerciseData, MealData, Severity, SymptomData};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

const NUTRIENT_FIELDS: [&str; 4] = ["calories", "protein", "carbohydrates", "fats"];

/// One violated constraint on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Wire field name, with `[index]` for list elements.
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered, non-empty set of violations for one payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} payload: {}", join_violations(.violations))]
pub struct PayloadViolations {
    pub kind: EventKind,
    pub violations: Vec<FieldViolation>,
}

impl PayloadViolations {
    /// Returns `Ok(())` for an empty list, otherwise the violations.
    pub fn into_result(kind: EventKind, violations: Vec<FieldViolation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { kind, violations })
        }
    }

    /// Violated field names in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations
            .iter()
            .map(|violation| violation.field.as_str())
            .collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates a meal payload.
pub fn validate_meal(data: &Value) -> Result<EventPayload, PayloadViolations> {
    let mut reader = ShapeReader::open(EventKind::Meal, data)?;

    let foods = reader.string_list("foods");
    if let Some(foods) = &foods {
        check_foods(foods, &mut reader.violations);
    }
    let [calories, protein, carbohydrates, fats] = NUTRIENT_FIELDS.map(|field| {
        let value = reader.optional_number(field);
        check_nutrient(field, value, &mut reader.violations);
        value
    });

    let violations = reader.finish();
    match foods {
        Some(foods) if violations.is_empty() => Ok(EventPayload::Meal(MealData {
            foods,
            calories,
            protein,
            carbohydrates,
            fats,
        })),
        _ => Err(PayloadViolations {
            kind: EventKind::Meal,
            violations,
        }),
    }
}

/// Validates an exercise payload.
pub fn validate_exercise(data: &Value) -> Result<EventPayload, PayloadViolations> {
    let mut reader = ShapeReader::open(EventKind::Exercise, data)?;

    let kind = reader.required_string("type");
    if let Some(kind) = &kind {
        check_not_blank("type", kind, &mut reader.violations);
    }
    let duration = reader.required_number("duration_minutes");
    if let Some(duration) = duration {
        check_duration(duration, &mut reader.violations);
    }

    let violations = reader.finish();
    match (kind, duration) {
        (Some(kind), Some(duration_minutes)) if violations.is_empty() => {
            Ok(EventPayload::Exercise(ExerciseData {
                kind,
                duration_minutes,
            }))
        }
        _ => Err(PayloadViolations {
            kind: EventKind::Exercise,
            violations,
        }),
    }
}

/// Validates a symptom payload.
pub fn validate_symptom(data: &Value) -> Result<EventPayload, PayloadViolations> {
    let mut reader = ShapeReader::open(EventKind::Symptom, data)?;

    let description = reader.required_string("description");
    if let Some(description) = &description {
        check_not_blank("description", description, &mut reader.violations);
    }
    let severity = reader.required_string("severity").and_then(|value| {
        let parsed = Severity::parse(&value);
        if parsed.is_none() {
            reader
                .violations
                .push(FieldViolation::new("severity", severity_message()));
        }
        parsed
    });

    let violations = reader.finish();
    match (description, severity) {
        (Some(description), Some(severity)) if violations.is_empty() => {
            Ok(EventPayload::Symptom(SymptomData {
                description,
                severity,
            }))
        }
        _ => Err(PayloadViolations {
            kind: EventKind::Symptom,
            violations,
        }),
    }
}

pub(crate) fn check_meal(meal: &MealData) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    check_foods(&meal.foods, &mut violations);
    let values = [meal.calories, meal.protein, meal.carbohydrates, meal.fats];
    for (field, value) in NUTRIENT_FIELDS.into_iter().zip(values) {
        check_nutrient(field, value, &mut violations);
    }
    violations
}

pub(crate) fn check_exercise(exercise: &ExerciseData) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    check_not_blank("type", &exercise.kind, &mut violations);
    check_duration(exercise.duration_minutes, &mut violations);
    violations
}

pub(crate) fn check_symptom(symptom: &SymptomData) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    check_not_blank("description", &symptom.description, &mut violations);
    violations
}

fn check_foods(foods: &[String], out: &mut Vec<FieldViolation>) {
    if foods.is_empty() {
        out.push(FieldViolation::new("foods", "must contain at least one item"));
        return;
    }
    for (index, food) in foods.iter().enumerate() {
        check_not_blank(&format!("foods[{index}]"), food, out);
    }
}

fn check_nutrient(field: &str, value: Option<f64>, out: &mut Vec<FieldViolation>) {
    if let Some(value) = value {
        if !(value.is_finite() && value >= 0.0) {
            out.push(FieldViolation::new(field, "must be a finite number >= 0"));
        }
    }
}

fn check_duration(value: f64, out: &mut Vec<FieldViolation>) {
    if !(value.is_finite() && value > 0.0) {
        out.push(FieldViolation::new(
            "duration_minutes",
            "must be a finite number > 0",
        ));
    }
}

fn check_not_blank(field: &str, value: &str, out: &mut Vec<FieldViolation>) {
    if value.trim().is_empty() {
        out.push(FieldViolation::new(field, "must not be blank"));
    }
}

fn severity_message() -> String {
    let allowed = Severity::ALL.map(Severity::as_str).join("|");
    format!("must be one of {allowed}")
}

/// Reads typed fields out of one JSON object, collecting shape violations.
struct ShapeReader<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<FieldViolation>,
}

impl<'a> ShapeReader<'a> {
    fn open(kind: EventKind, data: &'a Value) -> Result<Self, PayloadViolations> {
        match data.as_object() {
            Some(object) => Ok(Self {
                object,
                violations: Vec::new(),
            }),
            None => Err(PayloadViolations {
                kind,
                violations: vec![FieldViolation::new("data", "must be an object")],
            }),
        }
    }

    fn required(&mut self, field: &str) -> Option<&'a Value> {
        match self.object.get(field) {
            Some(Value::Null) | None => {
                self.violations
                    .push(FieldViolation::new(field, "field is required"));
                None
            }
            Some(value) => Some(value),
        }
    }

    fn required_string(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?;
        match value.as_str() {
            Some(text) => Some(text.to_string()),
            None => {
                self.violations
                    .push(FieldViolation::new(field, "must be a string"));
                None
            }
        }
    }

    fn required_number(&mut self, field: &str) -> Option<f64> {
        let value = self.required(field)?;
        self.number(field, value)
    }

    fn optional_number(&mut self, field: &str) -> Option<f64> {
        match self.object.get(field) {
            Some(Value::Null) | None => None,
            Some(value) => self.number(field, value),
        }
    }

    fn number(&mut self, field: &str, value: &Value) -> Option<f64> {
        let number = value.as_f64();
        if number.is_none() {
            self.violations
                .push(FieldViolation::new(field, "must be a number"));
        }
        number
    }

    fn string_list(&mut self, field: &str) -> Option<Vec<String>> {
        let value = self.required(field)?;
        let Some(items) = value.as_array() else {
            self.violations
                .push(FieldViolation::new(field, "must be an array of strings"));
            return None;
        };

        let mut strings = Vec::with_capacity(items.len());
        let mut well_typed = true;
        for (index, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(text) => strings.push(text.to_string()),
                None => {
                    well_typed = false;
                    self.violations.push(FieldViolation::new(
                        format!("{field}[{index}]"),
                        "must be a string",
                    ));
                }
            }
        }
        well_typed.then_some(strings)
    }

    fn finish(self) -> Vec<FieldViolation> {
        self.violations
    }
}
