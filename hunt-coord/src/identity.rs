//! Caller identity
//!
//! Credential verification is delegated to an [`IdentityGateway`]. A
//! verified subject gets a `users` row the first time it is seen; after that
//! the stored row is returned unchanged.

use async_trait::async_trait;
use hunt_common::config::HuntConfig;
use hunt_common::db::User;
use hunt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

/// Claims resolved from a valid credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
    pub picture_url: String,
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Verify a bearer credential
    ///
    /// Implementations return `Error::Unauthorized` for bad or expired input.
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity>;
}

/// Verify `credential` and return the matching user, creating it on first sight
pub async fn authenticate(
    pool: &SqlitePool,
    gateway: &dyn IdentityGateway,
    credential: &str,
) -> Result<User> {
    let identity = gateway.verify(credential).await?;
    provision_user(pool, &identity).await
}

/// Load or create the user for a verified identity
pub async fn provision_user(pool: &SqlitePool, identity: &VerifiedIdentity) -> Result<User> {
    if identity.subject_id.trim().is_empty() {
        return Err(Error::Unauthorized("identity has no subject".to_string()));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, name, email, picture)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&identity.subject_id)
    .bind(&identity.display_name)
    .bind(&identity.email)
    .bind(&identity.picture_url)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        info!(user = %identity.subject_id, "Provisioned new user on first authentication");
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, picture, team_id, team_join_seq FROM users WHERE id = ?",
    )
    .bind(&identity.subject_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Reject identities whose e-mail is not on the configured admin list
pub fn require_admin(identity: &VerifiedIdentity, config: &HuntConfig) -> Result<()> {
    if config.is_admin(&identity.email) {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!("{} is not an administrator", identity.email)))
    }
}
