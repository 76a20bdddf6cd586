//! Pull cursor port
//!
//! Stores, per entity kind, the newest server timestamp already pulled so
//! the next pull only asks for later changes.

use chrono::{DateTime, Utc};

use crate::domain::EntityKind;

#[async_trait::async_trait]
pub trait SinceParameterRepository: Send + Sync {
    /// Returns the cursor for `kind`, `None` before the first pull
    async fn get(&self, kind: EntityKind) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Stores the cursor for `kind`
    async fn set(&self, kind: EntityKind, since: DateTime<Utc>) -> anyhow::Result<()>;
}
