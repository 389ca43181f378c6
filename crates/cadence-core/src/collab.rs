//! In-process collaborator contracts.
//!
//! Persistence lives outside this workspace; the orchestrator only depends on
//! these traits.  Implementations are provided by the embedding application.

use async_trait::async_trait;

use crate::error::RepoError;
use crate::types::User;

/// Persists user records, including refreshed provider credentials.
///
/// `update` must be idempotent: the token-refresh path may persist the same
/// credential state more than once under concurrent requests.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist the given user record.
    async fn update(&self, user: &User) -> Result<(), RepoError>;
}

/// Update-or-create store for the athlete's free-form logbook.
#[async_trait]
pub trait LogbookService: Send + Sync {
    /// Fetch the logbook text, or `None` when the athlete has none yet.
    async fn get(&self, user_id: &str) -> Result<Option<String>, RepoError>;

    /// Replace an existing logbook.  Fails with [`RepoError::NotFound`] iff
    /// no logbook exists for the user.
    async fn update(&self, user_id: &str, content: &str) -> Result<(), RepoError>;

    /// Create or replace the logbook unconditionally.
    async fn upsert(&self, user_id: &str, content: &str) -> Result<(), RepoError>;
}
