//! Router Module Index
//!
//! Routes are split by who may call them. Authentication is applied as a layer on the
//! authenticated router; the admin role is checked inside each admin handler.

/// Anonymous-friendly reads plus register/login.
pub mod public;

/// Requires a valid session (`AuthUser`).
pub mod authenticated;

/// Nested under `/admin`; admin role required.
pub mod admin;
