//! Studio API server library.
//!
//! Exposes the building blocks (config, state, error handling, the workflow
//! orchestrator, the executor façade, routes) so integration tests and the
//! binary entrypoint can both reach them.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod server;
pub mod state;
pub mod workflows;
