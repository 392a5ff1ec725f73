//! Request/response API for event create/retrieve use-cases.
//!
//! # Responsibility
//! - Accept JSON request bodies and path values as plain strings.
//! - Map core results and errors onto HTTP-style status codes and
//!   `{"detail": ...}` error bodies.
//!
//! # Invariants
//! - Every call opens its own connection and drops it on every exit path.
//! - Calls never panic; storage failures become status 500.
//! - Unknown stored types are 400 on single fetch and skipped in listings.

use crate::config::ApiConfig;
use chrono::{DateTime, NaiveDateTime, Utc};
use gutiq_core::db::open_db;
use gutiq_core::{EventError, EventId, EventService, NewEvent, SqliteEventRepository};
use log::{error, info};
use serde_json::{json, Number, Value};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, detail: impl Into<String>) -> Self {
        Self::new(status, json!({ "detail": detail.into() }))
    }

    /// Error detail message, when this is an error response.
    pub fn detail(&self) -> Option<&str> {
        self.body.get("detail").and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Event endpoints bound to one database file.
#[derive(Debug, Clone)]
pub struct EventsApi {
    db_path: PathBuf,
}

impl EventsApi {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.db_path.clone())
    }

    /// Liveness probe; does not touch storage.
    pub fn health(&self) -> ApiResponse {
        ApiResponse::new(STATUS_OK, json!({ "status": "ok" }))
    }

    /// Creates one event from a `{timestamp, event_type, data}` body.
    ///
    /// Returns 201 `{"event_id": ...}` on success.
    pub fn create_event(&self, body: &str) -> ApiResponse {
        self.handle("create_event", || {
            let request = parse_create_body(body)
                .map_err(|detail| ApiResponse::error(STATUS_UNPROCESSABLE, detail))?;
            let event_id = self.with_service("create_event", |service| {
                service.create_event(&request)
            })?;
            Ok(ApiResponse::new(
                STATUS_CREATED,
                json!({ "event_id": event_id }),
            ))
        })
    }

    /// Lists all events newest first.
    ///
    /// Events with an unknown stored type or missing subtype data are left
    /// out rather than failing the whole list.
    pub fn get_all_events(&self) -> ApiResponse {
        self.handle("get_all_events", || {
            let events = self.with_service("get_all_events", |service| service.list_events())?;
            let body = serde_json::to_value(&events)
                .map_err(|err| internal_error("get_all_events", &err))?;
            Ok(ApiResponse::new(STATUS_OK, body))
        })
    }

    /// Gets one event by id.
    pub fn get_event(&self, event_id: &str) -> ApiResponse {
        self.handle("get_event", || {
            let event_id = parse_event_id(event_id)?;
            let event =
                self.with_service("get_event", |service| service.get_event(event_id))?;
            let body = serde_json::to_value(&event)
                .map_err(|err| internal_error("get_event", &err))?;
            Ok(ApiResponse::new(STATUS_OK, body))
        })
    }

    /// Deletes one event and its subtype data.
    pub fn delete_event(&self, event_id: &str) -> ApiResponse {
        self.handle("delete_event", || {
            let event_id = parse_event_id(event_id)?;
            self.with_service("delete_event", |service| service.delete_event(event_id))?;
            Ok(ApiResponse::new(STATUS_NO_CONTENT, Value::Null))
        })
    }

    fn handle(
        &self,
        operation: &str,
        f: impl FnOnce() -> Result<ApiResponse, ApiResponse>,
    ) -> ApiResponse {
        let started_at = Instant::now();
        let response = f().unwrap_or_else(|response| response);
        info!(
            "event=api_request module=api operation={operation} status={} duration_ms={}",
            response.status,
            started_at.elapsed().as_millis()
        );
        response
    }

    fn with_service<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut EventService<SqliteEventRepository<'_>>) -> Result<T, EventError>,
    ) -> Result<T, ApiResponse> {
        let mut conn = open_db(&self.db_path).map_err(|err| internal_error(operation, &err))?;
        let repo = SqliteEventRepository::try_new(&mut conn)
            .map_err(|err| internal_error(operation, &err))?;
        let mut service = EventService::new(repo);
        f(&mut service).map_err(|err| error_response(operation, err))
    }
}

fn error_response(operation: &str, err: EventError) -> ApiResponse {
    match err {
        EventError::InvalidPayload(violations) => {
            let details = violations
                .violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            ApiResponse::error(
                STATUS_BAD_REQUEST,
                format!("Invalid data format for {} event: {details}", violations.kind),
            )
        }
        EventError::UnknownEventType(unknown) => {
            ApiResponse::error(STATUS_BAD_REQUEST, format!("Unknown event type: {}", unknown.0))
        }
        EventError::NotFound(_) => ApiResponse::error(STATUS_NOT_FOUND, "Event not found"),
        EventError::DataIntegrity { kind, .. } => ApiResponse::error(
            STATUS_NOT_FOUND,
            format!("{} data not found for this event", capitalize(kind.as_str())),
        ),
        EventError::Repo(err) => internal_error(operation, &err),
    }
}

fn internal_error(operation: &str, err: &dyn std::error::Error) -> ApiResponse {
    error!(
        "event=api_request module=api operation={operation} status=error error_code=internal error={err}"
    );
    ApiResponse::error(STATUS_INTERNAL_ERROR, "Internal server error")
}

fn parse_create_body(body: &str) -> Result<NewEvent, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| format!("Malformed JSON body: {err}"))?;
    let Some(object) = value.as_object() else {
        return Err("Request body must be a JSON object".to_string());
    };

    let timestamp = match object.get("timestamp") {
        Some(Value::String(raw)) => parse_timestamp(raw)
            .ok_or_else(|| format!("timestamp: invalid datetime `{raw}`"))?,
        Some(Value::Number(seconds)) => timestamp_from_epoch_seconds(seconds)
            .ok_or_else(|| format!("timestamp: out of range epoch seconds `{seconds}`"))?,
        Some(Value::Null) | None => return Err("timestamp: field is required".to_string()),
        Some(_) => return Err("timestamp: must be a string or a number".to_string()),
    };
    let event_type = match object.get("event_type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(Value::Null) | None => return Err("event_type: field is required".to_string()),
        Some(_) => return Err("event_type: must be a string".to_string()),
    };

    Ok(NewEvent {
        timestamp,
        event_type,
        data: object.get("data").cloned().unwrap_or(Value::Null),
    })
}

/// Parses RFC 3339 (any offset, normalized to UTC) or a naive ISO-8601
/// date-time, which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Reads Unix epoch seconds, integral or fractional, as a UTC timestamp.
fn timestamp_from_epoch_seconds(seconds: &Number) -> Option<DateTime<Utc>> {
    if let Some(whole) = seconds.as_i64() {
        return DateTime::from_timestamp(whole, 0);
    }
    let fractional = seconds.as_f64().filter(|value| value.is_finite())?;
    let micros = (fractional * MICROS_PER_SECOND).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

fn parse_event_id(raw: &str) -> Result<EventId, ApiResponse> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ApiResponse::error(
            STATUS_UNPROCESSABLE,
            format!("event_id: invalid identifier `{raw}`"),
        )
    })
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
