//! Hearth web library.
//!
//! The request pipeline, sessions and error pages of the Hearth site,
//! provided as a library so the binary, the CLI and the integration tests
//! all build the same application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod state;
