//! In-memory pull cursors

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use chronosync_core::domain::EntityKind;
use chronosync_core::ports::SinceParameterRepository;

/// Per-kind "since" markers held in process memory
#[derive(Debug, Default)]
pub struct MemorySinceParameters {
    cursors: RwLock<HashMap<EntityKind, DateTime<Utc>>>,
}

impl MemorySinceParameters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SinceParameterRepository for MemorySinceParameters {
    async fn get(&self, kind: EntityKind) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.cursors.read().await.get(&kind).copied())
    }

    async fn set(&self, kind: EntityKind, since: DateTime<Utc>) -> anyhow::Result<()> {
        self.cursors.write().await.insert(kind, since);
        Ok(())
    }
}
