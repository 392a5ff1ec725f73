//! Event domain model.
//!
//! # Responsibility
//! - Define the envelope, the closed set of event kinds and their payloads.
//! - Validate untyped payloads into typed ones before any storage access.
//!
//! # Invariants
//! - Every event is identified by a stable `EventId`.
//! - One event owns exactly one payload, selected by its `EventKind`.

pub mod event;
pub mod validation;
