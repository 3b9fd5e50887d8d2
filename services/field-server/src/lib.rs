//! Field Server Service Library
//!
//! HTTP front end for the field engine: JSON read requests in, field
//! volumes, headers or time lists out.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
