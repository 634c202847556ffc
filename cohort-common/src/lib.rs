//! # Cohort Common Library
//!
//! Shared code for the Cohort grade-records backend:
//! - Database models (students, grade rows, accounts)
//! - Academic-record reconciliation (the GPA engine)
//! - Opaque identifier / payload codecs
//! - Password hashing and bearer-token primitives
//! - Common error types

pub mod auth;
pub mod calc;
pub mod codec;
pub mod error;
pub mod models;

pub use error::{Error, Result};
