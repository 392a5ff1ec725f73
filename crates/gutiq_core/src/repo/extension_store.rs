//! Per-kind extension record stores.
//!
//! # Responsibility
//! - Own the SQL for the `meals`, `exercises` and `symptoms` tables.
//! - Encode/decode column values that have no native SQLite type.
//!
//! # Invariants
//! - Extension rows are keyed by the owning envelope's `event_id`.
//! - A store only accepts the payload variant of its own kind.
//! - Food lists are stored as a JSON array, so item text may contain any
//!   character, commas included.

use crate::model::event::{
    EventId, EventKind, EventPayload, ExerciseData, MealData, Severity, SymptomData,
};
use crate::repo::event_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Storage accessor for one extension table.
///
/// `insert` runs on the caller's connection, which during creation is the
/// open write transaction.
pub trait ExtensionStore: Sync {
    /// Table holding this store's rows.
    fn table(&self) -> &'static str;
    /// Inserts the extension row for `event_id`.
    fn insert(&self, conn: &Connection, event_id: EventId, payload: &EventPayload)
        -> RepoResult<()>;
    /// Loads the extension row for `event_id`, `None` when absent.
    fn load(&self, conn: &Connection, event_id: EventId) -> RepoResult<Option<EventPayload>>;
}

/// `meals` table store.
pub struct MealStore;

/// `exercises` table store.
pub struct ExerciseStore;

/// `symptoms` table store.
pub struct SymptomStore;

impl ExtensionStore for MealStore {
    fn table(&self) -> &'static str {
        "meals"
    }

    fn insert(
        &self,
        conn: &Connection,
        event_id: EventId,
        payload: &EventPayload,
    ) -> RepoResult<()> {
        let EventPayload::Meal(meal) = payload else {
            return Err(variant_mismatch(EventKind::Meal, payload));
        };

        conn.execute(
            "INSERT INTO meals (
                event_id,
                foods,
                calories,
                protein,
                carbohydrates,
                fats
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                event_id.to_string(),
                encode_food_list(&meal.foods)?,
                meal.calories,
                meal.protein,
                meal.carbohydrates,
                meal.fats,
            ],
        )?;
        Ok(())
    }

    fn load(&self, conn: &Connection, event_id: EventId) -> RepoResult<Option<EventPayload>> {
        let row = conn
            .query_row(
                "SELECT foods, calories, protein, carbohydrates, fats
                 FROM meals
                 WHERE event_id = ?1;",
                [event_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("foods")?,
                        row.get::<_, Option<f64>>("calories")?,
                        row.get::<_, Option<f64>>("protein")?,
                        row.get::<_, Option<f64>>("carbohydrates")?,
                        row.get::<_, Option<f64>>("fats")?,
                    ))
                },
            )
            .optional()?;

        let Some((foods, calories, protein, carbohydrates, fats)) = row else {
            return Ok(None);
        };
        Ok(Some(EventPayload::Meal(MealData {
            foods: decode_food_list(&foods)?,
            calories,
            protein,
            carbohydrates,
            fats,
        })))
    }
}

impl ExtensionStore for ExerciseStore {
    fn table(&self) -> &'static str {
        "exercises"
    }

    fn insert(
        &self,
        conn: &Connection,
        event_id: EventId,
        payload: &EventPayload,
    ) -> RepoResult<()> {
        let EventPayload::Exercise(exercise) = payload else {
            return Err(variant_mismatch(EventKind::Exercise, payload));
        };

        conn.execute(
            "INSERT INTO exercises (event_id, type, duration_minutes) VALUES (?1, ?2, ?3);",
            params![
                event_id.to_string(),
                exercise.kind.as_str(),
                exercise.duration_minutes,
            ],
        )?;
        Ok(())
    }

    fn load(&self, conn: &Connection, event_id: EventId) -> RepoResult<Option<EventPayload>> {
        let exercise = conn
            .query_row(
                "SELECT type, duration_minutes FROM exercises WHERE event_id = ?1;",
                [event_id.to_string()],
                |row| {
                    Ok(ExerciseData {
                        kind: row.get("type")?,
                        duration_minutes: row.get("duration_minutes")?,
                    })
                },
            )
            .optional()?;
        Ok(exercise.map(EventPayload::Exercise))
    }
}

impl ExtensionStore for SymptomStore {
    fn table(&self) -> &'static str {
        "symptoms"
    }

    fn insert(
        &self,
        conn: &Connection,
        event_id: EventId,
        payload: &EventPayload,
    ) -> RepoResult<()> {
        let EventPayload::Symptom(symptom) = payload else {
            return Err(variant_mismatch(EventKind::Symptom, payload));
        };

        conn.execute(
            "INSERT INTO symptoms (event_id, description, severity) VALUES (?1, ?2, ?3);",
            params![
                event_id.to_string(),
                symptom.description.as_str(),
                symptom.severity.as_str(),
            ],
        )?;
        Ok(())
    }

    fn load(&self, conn: &Connection, event_id: EventId) -> RepoResult<Option<EventPayload>> {
        let row = conn
            .query_row(
                "SELECT description, severity FROM symptoms WHERE event_id = ?1;",
                [event_id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((description, severity_text)) = row else {
            return Ok(None);
        };
        let severity = Severity::parse(&severity_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid severity `{severity_text}` in symptoms.severity"
            ))
        })?;
        Ok(Some(EventPayload::Symptom(SymptomData {
            description,
            severity,
        })))
    }
}

/// Encodes a food list for the `meals.foods` column.
pub fn encode_food_list(foods: &[String]) -> RepoResult<String> {
    Ok(serde_json::to_string(foods)?)
}

/// Decodes the `meals.foods` column.
pub fn decode_food_list(value: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(value).map_err(|err| {
        RepoError::InvalidData(format!("invalid food list in meals.foods: {err}"))
    })
}

fn variant_mismatch(expected: EventKind, payload: &EventPayload) -> RepoError {
    RepoError::InvalidData(format!(
        "{expected} store cannot persist a {} payload",
        payload.kind()
    ))
}
