//! layerdb-api: REST API server for layerdb
//!
//! This crate provides the REST API the serving daemon exposes:
//! - Manifest listing and lookup
//! - Manifest deletion with layer cleanup
//! - Layer reference and integrity reports
//! - Store status

pub mod rest;

pub use rest::create_router;
