//! Resolution of the labels a copy is driven by
//!
//! Labels are matched case-insensitively. Environment labels (the base collection and the
//! base database) match either the exact name or a name starting with `"<label> "`, so
//! `staging` finds `Staging (EU)` but not `staging2`. Target labels match by prefix.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use super::location::depth;
use super::Target;
use crate::database::entities::{collection, database};
use crate::errors::{CopyResult, ResolutionError};

#[derive(Debug, Clone)]
pub struct LabelMatcher {
    label: String,
}

impl LabelMatcher {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.trim().to_lowercase(),
        }
    }

    pub fn matches_exact(&self, name: &str) -> bool {
        name.to_lowercase() == self.label
    }

    pub fn matches_environment(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        name == self.label || name.starts_with(&format!("{} ", self.label))
    }

    pub fn matches_prefix(&self, name: &str) -> bool {
        name.to_lowercase().starts_with(&self.label)
    }
}

/// The top-level collection named `label`
pub async fn find_root<C: ConnectionTrait>(db: &C, label: &str) -> CopyResult<collection::Model> {
    let matcher = LabelMatcher::new(label);
    let mut roots: Vec<_> = collection::Entity::find()
        .filter(collection::Column::Location.eq("/"))
        .order_by_asc(collection::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter(|c| matcher.matches_exact(&c.name))
        .collect();

    match roots.len() {
        0 => Err(ResolutionError::RootNotFound(label.to_string()).into()),
        1 => Ok(roots.remove(0)),
        _ => Err(ResolutionError::AmbiguousRoot(label.to_string()).into()),
    }
}

/// The direct child of `root` carrying the base environment label
pub async fn find_base_collection<C: ConnectionTrait>(
    db: &C,
    root: &collection::Model,
    label: &str,
) -> CopyResult<collection::Model> {
    let matcher = LabelMatcher::new(label);
    let mut matches: Vec<_> = collection::Entity::find()
        .filter(collection::Column::Location.eq(root.children_location()))
        .order_by_asc(collection::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter(|c| matcher.matches_environment(&c.name))
        .collect();

    match matches.len() {
        0 => Err(ResolutionError::BaseCollectionNotFound {
            label: label.to_string(),
            root_id: root.id,
        }
        .into()),
        1 => Ok(matches.remove(0)),
        _ => Err(ResolutionError::AmbiguousBaseCollection {
            label: label.to_string(),
            ids: matches.iter().map(|c| c.id).collect(),
        }
        .into()),
    }
}

/// `collection` and all of its descendants, shallowest first
pub async fn collect_subtree<C: ConnectionTrait>(
    db: &C,
    collection: collection::Model,
) -> CopyResult<Vec<collection::Model>> {
    let mut subtree = collection::Entity::find()
        .filter(collection::Column::Location.starts_with(collection.children_location()))
        .order_by_asc(collection::Column::Id)
        .all(db)
        .await?;
    subtree.push(collection);
    subtree.sort_by_key(|c| (depth(&c.location), c.id));
    Ok(subtree)
}

pub async fn list_databases<C: ConnectionTrait>(db: &C) -> CopyResult<Vec<database::Model>> {
    Ok(database::Entity::find()
        .order_by_asc(database::Column::Id)
        .all(db)
        .await?)
}

pub fn resolve_base_database(
    databases: &[database::Model],
    label: &str,
) -> Result<database::Model, ResolutionError> {
    let matcher = LabelMatcher::new(label);
    let matches: Vec<_> = databases
        .iter()
        .filter(|d| matcher.matches_environment(&d.name))
        .collect();

    match matches.as_slice() {
        [] => Err(ResolutionError::BaseDatabaseNotFound(label.to_string())),
        [base] => Ok((*base).clone()),
        _ => Err(ResolutionError::AmbiguousBaseDatabase {
            label: label.to_string(),
            ids: matches.iter().map(|d| d.id).collect(),
        }),
    }
}

/// Every database except the base one, narrowed to `only` when it is not empty
pub fn resolve_targets(
    databases: &[database::Model],
    base_id: i32,
    only: &[String],
) -> Result<Vec<Target>, ResolutionError> {
    let matchers: Vec<_> = only.iter().map(|label| LabelMatcher::new(label)).collect();
    let targets: Vec<Target> = databases
        .iter()
        .filter(|d| d.id != base_id)
        .filter(|d| matchers.is_empty() || matchers.iter().any(|m| m.matches_prefix(&d.name)))
        .cloned()
        .map(Target::from)
        .collect();

    if targets.is_empty() {
        return Err(ResolutionError::NoTargets(only.to_vec()));
    }
    Ok(targets)
}

/// The one database matching `label`; an exact match wins over prefix matches
pub fn resolve_single_target(
    databases: &[database::Model],
    label: &str,
) -> Result<Target, ResolutionError> {
    let matcher = LabelMatcher::new(label);
    if let Some(exact) = databases.iter().find(|d| matcher.matches_exact(&d.name)) {
        return Ok(exact.clone().into());
    }

    let matches: Vec<_> = databases
        .iter()
        .filter(|d| matcher.matches_prefix(&d.name))
        .collect();
    match matches.as_slice() {
        [] => Err(ResolutionError::TargetNotFound(label.to_string())),
        [target] => Ok((*target).clone().into()),
        _ => Err(ResolutionError::AmbiguousTarget {
            label: label.to_string(),
            names: matches.iter().map(|d| d.name.clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(id: i32, name: &str) -> database::Model {
        database::Model {
            id,
            name: name.to_string(),
            engine: "postgres".to_string(),
        }
    }

    fn databases() -> Vec<database::Model> {
        vec![
            db(1, "Staging (EU)"),
            db(2, "prod eu"),
            db(3, "prod us"),
            db(4, "qa"),
        ]
    }

    #[test]
    fn test_label_matching() {
        let matcher = LabelMatcher::new("Staging");
        assert!(matcher.matches_environment("staging (eu)"));
        assert!(matcher.matches_environment("STAGING"));
        assert!(!matcher.matches_environment("staging2"));
        assert!(matcher.matches_prefix("staging2"));
        assert!(!matcher.matches_exact("staging2"));
    }

    #[test]
    fn test_base_database() {
        assert_eq!(resolve_base_database(&databases(), "staging").unwrap().id, 1);
        assert_eq!(
            resolve_base_database(&databases(), "dev"),
            Err(ResolutionError::BaseDatabaseNotFound("dev".to_string()))
        );
        assert!(resolve_base_database(&databases(), "prod")
            .unwrap_err()
            .is_ambiguous());
    }

    #[test]
    fn test_targets_exclude_base_and_honour_allow_list() {
        let all = resolve_targets(&databases(), 1, &[]).unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 3, 4]);

        let prod = resolve_targets(&databases(), 1, &["PROD".to_string()]).unwrap();
        assert_eq!(prod.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(prod[0].label, "prod eu");

        assert_eq!(
            resolve_targets(&databases(), 1, &["dev".to_string()]),
            Err(ResolutionError::NoTargets(vec!["dev".to_string()]))
        );
    }

    #[test]
    fn test_single_target() {
        assert_eq!(resolve_single_target(&databases(), "qa").unwrap().id, 4);
        assert_eq!(resolve_single_target(&databases(), "prod us").unwrap().id, 3);
        assert!(resolve_single_target(&databases(), "prod")
            .unwrap_err()
            .is_ambiguous());
        assert!(matches!(
            resolve_single_target(&databases(), "dev"),
            Err(ResolutionError::TargetNotFound(_))
        ));
    }
}
