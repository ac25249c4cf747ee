//! Daily Dish Core - Shared types library.
//!
//! This crate provides common types used across all Daily Dish components:
//! - `engine` - Account, session, and personalization state engine
//! - UI layers that consume the engine's read surface
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no store access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and ratings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
