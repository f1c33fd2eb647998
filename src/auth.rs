//! Caller identity: bearer tokens, password hashing and the axum guards
//! that resolve a verified user for each request.

pub mod middleware;
pub mod models;
pub mod password;
pub mod token;
