//! URL shortener service implementation.
//!
//! This crate composes a [`Generator`](linkwatch_generator::Generator) and a
//! [`Repository`](linkwatch_core::Repository) into the create, list and
//! update surface. Core types are re-exported from `linkwatch_core`.

pub mod service;

pub use linkwatch_core::{ShortenParams, Shortener, ShortenerError};
pub use service::{ShortenerService, ShortenerSettings};
