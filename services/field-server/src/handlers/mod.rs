//! HTTP request handlers for the field server.

pub mod fields;
pub mod health;
