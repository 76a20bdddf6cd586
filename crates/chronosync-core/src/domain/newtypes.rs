//! Domain newtypes
//!
//! Strongly-typed wrappers for entity identifiers and entity kinds.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// EntityId
// ============================================================================

/// Identifier of a synchronized record
///
/// Positive values are assigned by the server. Zero and negative values are
/// local placeholders handed out before the record was ever created remotely;
/// a successful create replaces the placeholder with the server id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Returns true if the id was assigned by the server
    #[must_use]
    pub const fn is_server_assigned(&self) -> bool {
        self.0 > 0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// EntityKind
// ============================================================================

/// Kind of synchronized record, used to key per-type sync cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Time tracking entries
    TimeEntries,
}

impl EntityKind {
    /// Returns the kind name as used in configuration and logs
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::TimeEntries => "time_entries",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_entries" => Ok(EntityKind::TimeEntries),
            other => Err(DomainError::UnknownEntityKind(other.to_string())),
        }
    }
}
