//! Library exports for the link service
//!
//! The binary in `main.rs` only wires configuration, storage and the
//! router together; everything else lives here so integration tests can
//! build the full application in-process.

pub mod analytics;
pub mod auth;
pub mod client_info;
pub mod codegen;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod response;
pub mod route;
pub mod shortener;
pub mod state;
