//! Business logic services.
//!
//! - `auth` - Local username/password strategy and principal (de)serialization

pub mod auth;
