//! Core types for Hearth.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod mode;
pub mod username;

pub use id::UserId;
pub use mode::OperatingMode;
pub use username::{Username, UsernameError};
