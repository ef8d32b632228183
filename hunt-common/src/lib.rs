//! # Hunt Common Library
//!
//! Shared code for the team hunt services including:
//! - Database schema bootstrap and row models
//! - Error taxonomy (not found / conflict / unauthorized / store)
//! - Configuration loading and root folder resolution
//! - One-way answer hashing

pub mod answer;
pub mod config;
pub mod db;
pub mod error;

pub use answer::AnswerPolicy;
pub use error::{Conflict, Error, ErrorKind, Result};
