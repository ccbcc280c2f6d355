//! Licensor - license key issuance and hardware-bound validation
//!
//! This library provides the license state machine, key generation, the
//! SQLite-backed license store, and the HTTP handlers for the check endpoint
//! and the operator API.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod keygen;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod util;
