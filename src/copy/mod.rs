//! Dependency-ordered copy of a collection tree into target databases
//!
//! The pieces, leaf first:
//!
//! - [`cache`]: memoized table/field identity lookups for one run
//! - [`id_map`]: source id → {target database → copied id} translation maps
//! - [`location`]: collection location path rewriting
//! - [`query`]: rewriting of serialized queries and parameter mappings
//! - [`remap`]: per-entity row rewriting
//! - [`targets`]: label matching for roots, base environment and targets
//! - [`teardown`]: removal of previous copies and primary-key sequence reset
//! - [`run`]: the copy pass threading all of the above through one transaction

pub mod cache;
pub mod id_map;
pub mod location;
pub mod query;
pub mod remap;
pub mod run;
pub mod targets;
pub mod teardown;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cache::ReferenceCache;
pub use id_map::{IdMaps, TranslationMap};
pub use location::remap_location;
pub use query::{rewrite_query, ReferenceResolver};
pub use run::{CopyRun, RunOptions};
pub use targets::LabelMatcher;

/// The kinds of rows that receive fresh ids when copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Collection,
    Card,
    Dashboard,
    DashboardCard,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Collection => write!(f, "collection"),
            EntityKind::Card => write!(f, "card"),
            EntityKind::Dashboard => write!(f, "dashboard"),
            EntityKind::DashboardCard => write!(f, "dashboard card"),
        }
    }
}

/// A database receiving its own duplicate of the copied tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: i32,
    /// Database name; top-level copies are renamed to it
    pub label: String,
}

impl Target {
    pub fn new(id: i32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

impl From<crate::database::entities::database::Model> for Target {
    fn from(model: crate::database::entities::database::Model) -> Self {
        Self::new(model.id, model.name)
    }
}

/// What `card__<id>` references do when the nested card has not been copied yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedCardPolicy {
    /// Copy the nested card on demand into the same target
    #[default]
    AutoCopy,
    /// Fail the run
    RequireCopied,
}
