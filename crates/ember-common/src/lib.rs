//! # Ember Common
//!
//! Common types and utilities shared by the Ember particle engine crates.
//!
//! This crate provides:
//! - RGBA colour values
//! - Bounding boxes and scene node transforms
//! - String conversion helpers for the parameter binder
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod colour;
pub mod convert;
pub mod error;
pub mod math;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::colour::*;
    pub use crate::error::*;
    pub use crate::math::*;
}

pub use prelude::*;
