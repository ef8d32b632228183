//! One-way answer hashing
//!
//! Answers are stored as Argon2id PHC strings (`$argon2id$v=19$...`) over the
//! normalized answer text. The plaintext is never persisted.
//!
//! # Blocking
//!
//! Hashing and verification are deliberately slow. Async callers run them on
//! the blocking pool (`tokio::task::spawn_blocking`).

use crate::error::{Error, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

/// How answer text is normalized before hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
    /// Trim surrounding whitespace and compare case-insensitively
    #[default]
    CaseInsensitive,
    /// Hash the text exactly as given
    Exact,
}

impl AnswerPolicy {
    pub fn normalize(&self, answer: &str) -> String {
        match self {
            AnswerPolicy::CaseInsensitive => answer.trim().to_lowercase(),
            AnswerPolicy::Exact => answer.to_string(),
        }
    }
}

/// Hash an answer with a fresh random salt
pub fn hash_answer(answer: &str, policy: AnswerPolicy) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(policy.normalize(answer).as_bytes(), &salt)
        .map_err(|e| Error::Internal(format!("answer hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a candidate answer against a stored hash
///
/// Returns false for malformed hashes rather than erroring, since a
/// malformed hash can never match anything.
pub fn verify_answer(stored_hash: &str, candidate: &str, policy: AnswerPolicy) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(policy.normalize(candidate).as_bytes(), &parsed)
        .is_ok()
}
