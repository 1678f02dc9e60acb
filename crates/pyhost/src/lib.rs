//! # pyhost Shared Rust Library
//!
//! Shared infrastructure for the pyhost crates:
//! - **error**: the error taxonomy for embedding, marshaling and invocation
//! - **tracing**: logging setup with lifecycle prefixes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pyhost::error::{Error, ForeignError};
//! pyhost::tracing::init();
//! ```

pub mod error;
pub mod tracing;

pub use error::{Error, ForeignError, Result};
