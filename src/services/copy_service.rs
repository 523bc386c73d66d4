use sea_orm::*;
use tracing::{info, warn};

use crate::copy::remap::CollectionBinding;
use crate::copy::run::CopyCounts;
use crate::copy::teardown::{self, SequencedTable, TeardownReport};
use crate::copy::targets;
use crate::copy::{CopyRun, NestedCardPolicy, RunOptions, Target};
use crate::database::entities::{card, collection};
use crate::errors::{CopyError, CopyResult, ResolutionError};

/// Knobs shared by every entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySettings {
    pub sequence_margin: i64,
    pub rename_depth: usize,
    pub nested_cards: NestedCardPolicy,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            sequence_margin: 1000,
            rename_depth: 1,
            nested_cards: NestedCardPolicy::AutoCopy,
        }
    }
}

impl CopySettings {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            rename_depth: self.rename_depth,
            nested_cards: self.nested_cards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCopyRequest {
    /// Name of the top-level collection holding one child per environment
    pub root: String,
    /// Label of the environment copied from, both collection and database
    pub base: String,
    /// Target database name prefixes; empty means every database but the base
    pub only: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCopyReport {
    pub root_id: i32,
    pub base_collection_id: i32,
    pub base_database_id: i32,
    pub targets: Vec<Target>,
    pub teardown: TeardownReport,
    pub sequences: Vec<(SequencedTable, i64)>,
    pub copied: CopyCounts,
    /// Copies of the base collection, one per target
    pub copies: Vec<(Target, i32)>,
    pub committed: bool,
}

/// Service copying Metabase artifacts between database environments
#[derive(Clone)]
pub struct CopyService {
    db: DatabaseConnection,
    settings: CopySettings,
}

impl CopyService {
    pub fn new(db: DatabaseConnection, settings: CopySettings) -> Self {
        Self { db, settings }
    }

    /// Replace every target's copy of the base collection tree with a fresh one
    pub async fn bulk_copy(&self, request: &BulkCopyRequest) -> CopyResult<BulkCopyReport> {
        let txn = self.db.begin().await?;
        match self.bulk_copy_in(&txn, request).await {
            Ok(mut report) => {
                report.committed = finish(txn, request.dry_run).await?;
                Ok(report)
            }
            Err(e) => Err(abort(txn, e).await),
        }
    }

    async fn bulk_copy_in(
        &self,
        txn: &DatabaseTransaction,
        request: &BulkCopyRequest,
    ) -> CopyResult<BulkCopyReport> {
        let root = targets::find_root(txn, &request.root).await?;
        let base = targets::find_base_collection(txn, &root, &request.base).await?;
        let databases = targets::list_databases(txn).await?;
        let base_database = targets::resolve_base_database(&databases, &request.base)?;
        let copy_targets = targets::resolve_targets(&databases, base_database.id, &request.only)?;
        info!(
            "Copying '{}' ({}) under '{}' ({}) from database {} to {} targets: {}",
            base.name,
            base.id,
            root.name,
            root.id,
            base_database.id,
            copy_targets.len(),
            copy_targets
                .iter()
                .map(|t| t.label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let previous = teardown::previous_copies(txn, &root, &base, &copy_targets).await?;
        let removed = teardown::delete_collections(txn, &previous).await?;
        let sequences = teardown::reset_sequences(txn, self.settings.sequence_margin).await?;

        let subtree = targets::collect_subtree(txn, base.clone()).await?;
        let mut run = CopyRun::new(txn, self.settings.run_options()).with_nested_home(base.id);
        let copied = run.copy_tree(&subtree, &copy_targets).await?;

        let mut copies = Vec::with_capacity(copy_targets.len());
        for target in &copy_targets {
            copies.push((target.clone(), run.maps().collections.get(base.id, target.id)?));
        }

        info!(
            "Copied {} collections, {} cards, {} dashboards, {} dashboard cards, {} series, {} permissions",
            copied.collections,
            copied.cards,
            copied.dashboards,
            copied.dashboard_cards,
            copied.card_series,
            copied.permissions
        );

        Ok(BulkCopyReport {
            root_id: root.id,
            base_collection_id: base.id,
            base_database_id: base_database.id,
            targets: copy_targets,
            teardown: removed,
            sequences,
            copied,
            copies,
            committed: false,
        })
    }

    /// Copy one collection subtree into the database matching `target`; returns the new root id
    pub async fn copy_collection(
        &self,
        collection_id: i32,
        target: &str,
        dry_run: bool,
    ) -> CopyResult<i32> {
        let txn = self.db.begin().await?;
        match self.copy_collection_in(&txn, collection_id, target).await {
            Ok(new_id) => {
                finish(txn, dry_run).await?;
                Ok(new_id)
            }
            Err(e) => Err(abort(txn, e).await),
        }
    }

    async fn copy_collection_in(
        &self,
        txn: &DatabaseTransaction,
        collection_id: i32,
        target: &str,
    ) -> CopyResult<i32> {
        let source = collection::Entity::find_by_id(collection_id)
            .one(txn)
            .await?
            .ok_or(ResolutionError::SourceNotFound {
                entity: "collection",
                id: collection_id,
            })?;
        let databases = targets::list_databases(txn).await?;
        let target = targets::resolve_single_target(&databases, target)?;
        info!(
            "Copying collection {} '{}' to {} ({})",
            source.id, source.name, target.label, target.id
        );

        let subtree = targets::collect_subtree(txn, source.clone()).await?;
        let mut run = CopyRun::new(txn, self.settings.run_options());
        run.copy_tree(&subtree, std::slice::from_ref(&target)).await?;
        Ok(run.maps().collections.get(source.id, target.id)?)
    }

    /// Copy one card into the database matching `target`; returns the new card id
    pub async fn copy_card(&self, card_id: i32, target: &str, dry_run: bool) -> CopyResult<i32> {
        let txn = self.db.begin().await?;
        match self.copy_card_in(&txn, card_id, target).await {
            Ok(new_id) => {
                finish(txn, dry_run).await?;
                Ok(new_id)
            }
            Err(e) => Err(abort(txn, e).await),
        }
    }

    async fn copy_card_in(
        &self,
        txn: &DatabaseTransaction,
        card_id: i32,
        target: &str,
    ) -> CopyResult<i32> {
        let source = card::Entity::find_by_id(card_id)
            .one(txn)
            .await?
            .ok_or(ResolutionError::SourceNotFound {
                entity: "card",
                id: card_id,
            })?;
        let databases = targets::list_databases(txn).await?;
        let target = targets::resolve_single_target(&databases, target)?;
        info!(
            "Copying card {} '{}' to {} ({})",
            source.id, source.name, target.label, target.id
        );

        let mut run = CopyRun::new(txn, self.settings.run_options());
        run.copy_card(&source, &target, CollectionBinding::IfMapped)
            .await
    }
}

/// Commit, or roll back when `dry_run`; returns whether the changes were kept
async fn finish(txn: DatabaseTransaction, dry_run: bool) -> CopyResult<bool> {
    if dry_run {
        txn.rollback().await?;
        info!("Dry run: all changes rolled back");
        Ok(false)
    } else {
        txn.commit().await?;
        info!("Changes committed");
        Ok(true)
    }
}

async fn abort(txn: DatabaseTransaction, error: CopyError) -> CopyError {
    match &error {
        CopyError::Remap(remap) => match remap.target() {
            Some(target) => warn!("Rolling back, copy into database {} failed: {}", target, remap),
            None => warn!("Rolling back: {}", remap),
        },
        other => warn!("Rolling back: {}", other),
    }
    if let Err(rollback) = txn.rollback().await {
        warn!("Rollback after failed copy also failed: {}", rollback);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::*;
    use serde_json::json;

    async fn service() -> (DatabaseConnection, CopyService) {
        let db = setup_test_db().await.unwrap();
        (db.clone(), CopyService::new(db, CopySettings::default()))
    }

    #[tokio::test]
    async fn test_unknown_root_is_a_resolution_error() {
        let (_, service) = service().await;
        let err = service
            .bulk_copy(&BulkCopyRequest {
                root: "environments".to_string(),
                base: "staging".to_string(),
                only: vec![],
                dry_run: false,
            })
            .await
            .unwrap_err();
        assert!(err.is_resolution_error());
    }

    #[tokio::test]
    async fn test_copy_card_without_collection_copy_keeps_collection() {
        let (db, service) = service().await;
        let staging = insert_database(&db, "staging").await.unwrap();
        let prod = insert_database(&db, "prod").await.unwrap();
        let orders = insert_table(&db, staging.id, "public", "orders").await.unwrap();
        let prod_orders = insert_table(&db, prod.id, "public", "orders").await.unwrap();
        let folder = insert_collection(&db, "Reports", "/", None).await.unwrap();
        let source = insert_card(
            &db,
            "Orders",
            Some(folder.id),
            staging.id,
            Some(orders.id),
            &json!({"database": staging.id, "query": {"source-table": orders.id}}),
        )
        .await
        .unwrap();

        let new_id = service.copy_card(source.id, "PROD", false).await.unwrap();
        let copy = card::Entity::find_by_id(new_id).one(&db).await.unwrap().unwrap();
        assert_eq!(copy.collection_id, Some(folder.id));
        assert_eq!(copy.database_id, prod.id);
        assert_eq!(copy.table_id, Some(prod_orders.id));
    }

    #[tokio::test]
    async fn test_missing_source_card() {
        let (db, service) = service().await;
        insert_database(&db, "prod").await.unwrap();
        let err = service.copy_card(42, "prod", false).await.unwrap_err();
        assert!(matches!(
            err,
            CopyError::Resolution(ResolutionError::SourceNotFound { id: 42, .. })
        ));
    }
}
