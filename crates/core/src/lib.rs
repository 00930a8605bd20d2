//! Domain logic for the generative-media workflow backend.
//!
//! This crate has no I/O. It owns the step-graph model, graph validation,
//! compilation of a step graph into engine source, and reconstruction of an
//! execution trace from the engine's step log. The database, engine client
//! and HTTP layers all build on these types.

pub mod error;
pub mod roles;
pub mod search;
pub mod storage;
pub mod types;
pub mod workflow;
