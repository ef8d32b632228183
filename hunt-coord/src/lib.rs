//! hunt-coord: team and question-bank coordination
//!
//! [`Coordinator`] is the entry point a transport layer calls into. It owns
//! the store handle and the maintenance gate; the modules below hold the
//! transactional logic.

pub mod code_gen;
pub mod feed;
pub mod identity;
pub mod publisher;
pub mod roster;
pub mod teams;
pub mod utils;

pub use feed::{DirectoryFeed, QuestionFeed, StaticFeed};
pub use identity::{IdentityGateway, VerifiedIdentity};
pub use publisher::RepublishSummary;
pub use roster::RosterAudit;
pub use teams::LeaveOutcome;

use hunt_common::config::HuntConfig;
use hunt_common::db::{QuestionGroup, QuestionGroupInput, Team, TeamWithMembers, User};
use hunt_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle for all coordination operations
///
/// Cheap to clone. Mutating operations hold the maintenance gate shared;
/// [`Coordinator::republish_all`] holds it exclusively, so it waits for
/// in-flight mutations and blocks new ones until it finishes.
#[derive(Clone)]
pub struct Coordinator {
    pool: SqlitePool,
    config: Arc<HuntConfig>,
    maintenance: Arc<RwLock<()>>,
}

impl Coordinator {
    pub fn new(pool: SqlitePool, config: HuntConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            maintenance: Arc::new(RwLock::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &HuntConfig {
        &self.config
    }

    pub async fn authenticate(&self, gateway: &dyn IdentityGateway, credential: &str) -> Result<User> {
        identity::authenticate(&self.pool, gateway, credential).await
    }

    pub async fn create_team(&self, team_name: &str, leader_id: &str) -> Result<Team> {
        let _gate = self.maintenance.read().await;
        teams::create_team(&self.pool, &self.config, team_name, leader_id).await
    }

    pub async fn join_team(&self, team_code: &str, user_id: &str) -> Result<User> {
        let _gate = self.maintenance.read().await;
        teams::join_team(&self.pool, &self.config, team_code, user_id).await
    }

    pub async fn leave_team(&self, user_id: &str) -> Result<LeaveOutcome> {
        let _gate = self.maintenance.read().await;
        teams::leave_team(&self.pool, &self.config, user_id).await
    }

    pub async fn find_team_by_code(&self, team_code: &str) -> Result<TeamWithMembers> {
        teams::find_team_by_code(&self.pool, team_code).await
    }

    pub async fn publish(&self, input: &QuestionGroupInput) -> Result<QuestionGroup> {
        let _gate = self.maintenance.read().await;
        publisher::publish(&self.pool, &self.config, input).await
    }

    pub async fn republish_all(&self, feed: &dyn QuestionFeed) -> Result<RepublishSummary> {
        let _gate = self.maintenance.write().await;
        tracing::warn!("Maintenance: replacing the entire question bank");
        publisher::republish_all(&self.pool, &self.config, feed).await
    }

    /// Insert any progress record missing from the team × question-group product
    pub async fn resync_roster(&self) -> Result<u64> {
        let _gate = self.maintenance.read().await;
        let mut tx = self.pool.begin().await?;
        let inserted = roster::sync_all(&mut tx).await?;
        tx.commit().await?;
        if inserted > 0 {
            tracing::warn!(inserted, "Roster resync filled missing progress records");
        }
        Ok(inserted)
    }

    pub async fn audit_roster(&self) -> Result<RosterAudit> {
        roster::audit(&self.pool).await
    }

    /// Close the store; call once at shutdown
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
