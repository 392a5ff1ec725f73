//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry dispatch and repository calls into use-case APIs.
//! - Keep boundary layers decoupled from storage details.

pub mod event_service;
