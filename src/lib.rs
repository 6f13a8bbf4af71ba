//! WildFi pipeline - telemetry import, quality checks and proximity graph
//! extraction for WildFi animal-borne tags.
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod error;
pub mod services;
pub mod wildfi;
