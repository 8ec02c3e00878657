//! layerdb-core: Core types for the layerdb model package store
//!
//! This crate provides the fundamental types shared by the store, the API
//! server and the command-line tools:
//! - Error handling
//! - Configuration types
//! - Qualified model names and their on-disk paths

pub mod config;
pub mod error;
pub mod name;

pub use config::*;
pub use error::*;
pub use name::*;
