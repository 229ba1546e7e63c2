//! Local entity store
//!
//! The reconciler needs little from persistence: load the entities to sync,
//! write back portal state as soon as it changes, and keep an audit row per
//! run. [`EntityStore`] is that seam; [`SqliteStore`] is the
//! production implementation on `~/.portal-sync/crm.db`.

mod db;
mod entities;
mod import;
mod runs;

pub use db::CrmDb;
pub use entities::{KindSummary, SqliteStore};
pub use import::parse_import;

use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::{EntityKind, SyncRun, SyncableEntity};

/// Persistence operations used during a sync run
pub trait EntityStore: Send + Sync {
    /// Entities of `kind`, restricted to `ids` when it is non-empty
    fn load(&self, kind: EntityKind, ids: &[String]) -> Result<Vec<SyncableEntity>>;

    /// Persist the portal-side state of one entity
    fn save_sync_state(&self, entity: &SyncableEntity) -> Result<()>;

    /// Append a finished run to the audit log
    fn record_run(&self, run: &SyncRun) -> Result<()>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>>;
}

/// Which entity types a run covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityFilter {
    Properties,
    Agents,
    #[default]
    All,
}

impl EntityFilter {
    /// Kinds to load, in processing order
    pub fn kinds(&self, agents_first: bool) -> Vec<EntityKind> {
        match self {
            EntityFilter::Properties => vec![EntityKind::Property],
            EntityFilter::Agents => vec![EntityKind::Agent],
            EntityFilter::All if agents_first => vec![EntityKind::Agent, EntityKind::Property],
            EntityFilter::All => vec![EntityKind::Property, EntityKind::Agent],
        }
    }
}

impl FromStr for EntityFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "properties" | "property" | "listings" => Ok(EntityFilter::Properties),
            "agents" | "agent" | "users" => Ok(EntityFilter::Agents),
            "all" | "" => Ok(EntityFilter::All),
            other => Err(format!(
                "unknown entity type '{}' (expected properties, agents or all)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_order() {
        assert_eq!(
            EntityFilter::All.kinds(true),
            vec![EntityKind::Agent, EntityKind::Property]
        );
        assert_eq!(
            EntityFilter::All.kinds(false),
            vec![EntityKind::Property, EntityKind::Agent]
        );
        assert_eq!(EntityFilter::Agents.kinds(false), vec![EntityKind::Agent]);
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("Properties".parse::<EntityFilter>(), Ok(EntityFilter::Properties));
        assert_eq!("agent".parse::<EntityFilter>(), Ok(EntityFilter::Agents));
        assert!("buildings".parse::<EntityFilter>().is_err());
    }
}
