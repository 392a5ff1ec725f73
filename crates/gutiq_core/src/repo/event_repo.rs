//! Event repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist an envelope and its extension record as one atomic unit.
//! - Read envelopes singly or newest-first, and load extension records
//!   through the registry.
//!
//! # Invariants
//! - Write paths call `EventPayload::validate()` before SQL mutations.
//! - Envelope and extension inserts share one `BEGIN IMMEDIATE` transaction;
//!   any failure rolls both back.
//! - Listing order is `timestamp DESC, event_id ASC`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::event::{EventEnvelope, EventId, EventKind, EventPayload};
use crate::model::validation::PayloadViolations;
use crate::registry::{self, EventTypeSpec};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::time::Instant;
use uuid::Uuid;

const ENVELOPE_SELECT_SQL: &str = "SELECT
    event_id,
    timestamp,
    event_type
FROM events";

const MICROS_PER_SECOND: i64 = 1_000_000;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for event persistence and query operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0}")]
    Validation(#[from] PayloadViolations),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("event not found: {0}")]
    NotFound(EventId),
    #[error("invalid persisted event data: {0}")]
    InvalidData(String),
    #[error("failed to encode column value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("connection schema version is {actual_version}, expected {expected_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("foreign key enforcement is disabled on this connection")]
    ForeignKeysDisabled,
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for event envelopes and their extension records.
pub trait EventRepository {
    /// Persists a new envelope plus extension and returns the new id.
    fn insert_event(
        &mut self,
        timestamp: DateTime<Utc>,
        payload: &EventPayload,
    ) -> RepoResult<EventId>;
    /// Gets one envelope by id.
    fn get_envelope(&self, event_id: EventId) -> RepoResult<Option<EventEnvelope>>;
    /// Lists all envelopes, newest first.
    fn list_envelopes(&self) -> RepoResult<Vec<EventEnvelope>>;
    /// Loads the extension record of `kind` owned by `event_id`.
    fn load_extension(&self, kind: EventKind, event_id: EventId)
        -> RepoResult<Option<EventPayload>>;
    /// Deletes an envelope; the extension row goes with it by cascade.
    fn delete_event(&mut self, event_id: EventId) -> RepoResult<()>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// Rejects connections with a stale schema, missing tables, or foreign
    /// keys turned off (cascade delete would silently stop working).
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn insert_event(
        &mut self,
        timestamp: DateTime<Utc>,
        payload: &EventPayload,
    ) -> RepoResult<EventId> {
        payload.validate()?;

        let started_at = Instant::now();
        let spec = registry::spec_for(payload.kind());
        let event_id = Uuid::new_v4();

        match insert_envelope_and_extension(self.conn, spec, event_id, timestamp, payload) {
            Ok(()) => {
                info!(
                    "event=event_create module=repo status=ok event_type={} duration_ms={}",
                    spec.tag(),
                    started_at.elapsed().as_millis()
                );
                Ok(event_id)
            }
            Err(err) => {
                error!(
                    "event=event_create module=repo status=error event_type={} duration_ms={} error_code=create_tx_failed error={}",
                    spec.tag(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn get_envelope(&self, event_id: EventId) -> RepoResult<Option<EventEnvelope>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENVELOPE_SELECT_SQL} WHERE event_id = ?1;"))?;
        let mut rows = stmt.query([event_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_envelope_row(row)?));
        }

        Ok(None)
    }

    fn list_envelopes(&self) -> RepoResult<Vec<EventEnvelope>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENVELOPE_SELECT_SQL} ORDER BY timestamp DESC, event_id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut envelopes = Vec::new();
        while let Some(row) = rows.next()? {
            envelopes.push(parse_envelope_row(row)?);
        }

        Ok(envelopes)
    }

    fn load_extension(
        &self,
        kind: EventKind,
        event_id: EventId,
    ) -> RepoResult<Option<EventPayload>> {
        let store = registry::spec_for(kind).store();
        let payload = store.load(&*self.conn, event_id)?;
        if let Some(payload) = &payload {
            payload.validate().map_err(|err| {
                RepoError::InvalidData(format!("{} row for {event_id}: {err}", store.table()))
            })?;
        }
        Ok(payload)
    }

    fn delete_event(&mut self, event_id: EventId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM events WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(event_id));
        }

        info!("event=event_delete module=repo status=ok event_id={event_id}");
        Ok(())
    }
}

fn insert_envelope_and_extension(
    conn: &mut Connection,
    spec: &EventTypeSpec,
    event_id: EventId,
    timestamp: DateTime<Utc>,
    payload: &EventPayload,
) -> RepoResult<()> {
    // Dropping `tx` on any early return rolls back the envelope insert.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO events (event_id, timestamp, event_type) VALUES (?1, ?2, ?3);",
        params![event_id.to_string(), timestamp_to_db(timestamp), spec.tag()],
    )?;
    spec.store().insert(&tx, event_id, payload)?;
    tx.commit()?;
    Ok(())
}

/// Converts a timestamp to the `events.timestamp` column value.
///
/// Precision is microseconds; sub-microsecond digits are truncated.
pub fn timestamp_to_db(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

/// Converts an `events.timestamp` column value back to a timestamp.
pub fn timestamp_from_db(micros: i64) -> Option<DateTime<Utc>> {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = u32::try_from(micros.rem_euclid(MICROS_PER_SECOND) * 1_000).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

fn parse_envelope_row(row: &Row<'_>) -> RepoResult<EventEnvelope> {
    let id_text: String = row.get("event_id")?;
    let event_id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in events.event_id"))
    })?;

    let micros: i64 = row.get("timestamp")?;
    let timestamp = timestamp_from_db(micros).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "out of range timestamp `{micros}` in events.timestamp"
        ))
    })?;

    Ok(EventEnvelope {
        event_id,
        timestamp,
        event_type: row.get("event_type")?,
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let extension_tables = registry::all().map(|spec| spec.store().table());
    for table in std::iter::once("events").chain(extension_tables) {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    let foreign_keys: i64 = conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(RepoError::ForeignKeysDisabled);
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

#[cfg(test)]
mod tests {
    use super::{timestamp_from_db, timestamp_to_db};
    use chrono::{TimeZone, Utc};

    #[test]
    fn timestamp_column_keeps_microseconds() {
        let timestamp = Utc.timestamp_opt(1_714_550_400, 123_456_000).unwrap();
        let stored = timestamp_to_db(timestamp);
        assert_eq!(stored, 1_714_550_400_123_456);
        assert_eq!(timestamp_from_db(stored), Some(timestamp));
    }

    #[test]
    fn timestamp_column_truncates_below_microseconds() {
        let timestamp = Utc.timestamp_opt(1_714_550_400, 123_456_789).unwrap();
        let expected = Utc.timestamp_opt(1_714_550_400, 123_456_000).unwrap();
        assert_eq!(timestamp_from_db(timestamp_to_db(timestamp)), Some(expected));
    }

    #[test]
    fn timestamp_column_handles_pre_epoch_values() {
        let timestamp = Utc.timestamp_opt(-1, 500_000_000).unwrap();
        assert_eq!(timestamp_from_db(timestamp_to_db(timestamp)), Some(timestamp));
    }
}
