//! The copy pass for one transaction
//!
//! A [`CopyRun`] owns everything that lives for exactly one run: the translation maps,
//! the reference cache and the set of cards currently being copied. Entities are written
//! in dependency order (collections shallowest first, then cards and dashboards, then
//! dashboard cards, series and permissions) so every foreign key a row needs is already
//! in a map when the row is remapped.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, info};

use super::cache::{FieldInfo, ReferenceCache, TableKey};
use super::query::{rewrite_query, ReferenceResolver};
use super::remap::{self, CollectionBinding, PermissionObject};
use super::{IdMaps, NestedCardPolicy, Target};
use crate::database::entities::{
    card, card_series, collection, dashboard, dashboard_card, field, permission, table,
};
use crate::errors::{CopyError, CopyResult, RemapError, RemapResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Copies whose new location has this many segments take the target's name
    pub rename_depth: usize,
    pub nested_cards: NestedCardPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            rename_depth: 1,
            nested_cards: NestedCardPolicy::AutoCopy,
        }
    }
}

/// Rows inserted by a run, summed over targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyCounts {
    pub collections: usize,
    pub cards: usize,
    pub dashboards: usize,
    pub dashboard_cards: usize,
    pub card_series: usize,
    pub permissions: usize,
}

pub struct CopyRun<'a, C: ConnectionTrait> {
    db: &'a C,
    options: RunOptions,
    cache: ReferenceCache,
    maps: IdMaps,
    counts: CopyCounts,
    // (card, target) pairs whose copy has started but not finished
    in_progress: HashSet<(i32, i32)>,
    // source collection whose copy receives nested cards found outside the copied tree
    nested_home: Option<i32>,
}

impl<'a, C: ConnectionTrait> CopyRun<'a, C> {
    pub fn new(db: &'a C, options: RunOptions) -> Self {
        Self {
            db,
            options,
            cache: ReferenceCache::new(),
            maps: IdMaps::new(),
            counts: CopyCounts::default(),
            in_progress: HashSet::new(),
            nested_home: None,
        }
    }

    /// File cards copied on demand from outside the copied tree under the target's copy of
    /// `collection_id`, so removing that copy also removes them
    pub fn with_nested_home(mut self, collection_id: i32) -> Self {
        self.nested_home = Some(collection_id);
        self
    }

    pub fn maps(&self) -> &IdMaps {
        &self.maps
    }

    /// Copy a collection tree and everything in it to every target.
    ///
    /// `collections` must be ordered shallowest first, as returned by
    /// [`super::targets::collect_subtree`].
    pub async fn copy_tree(
        &mut self,
        collections: &[collection::Model],
        targets: &[Target],
    ) -> CopyResult<CopyCounts> {
        self.copy_collections(collections, targets).await?;

        let collection_ids: Vec<i32> = collections.iter().map(|c| c.id).collect();
        let dashboard_ids = self.copy_collection_items(&collection_ids, targets).await?;
        let dashboard_card_ids = self.copy_dashboard_cards(&dashboard_ids, targets).await?;
        self.copy_card_series(&dashboard_card_ids, targets).await?;
        self.copy_permissions(&collection_ids).await?;

        let (hits, misses) = self.cache.stats();
        debug!("Reference cache: {} hits, {} misses", hits, misses);
        Ok(self.counts)
    }

    pub async fn copy_collections(
        &mut self,
        collections: &[collection::Model],
        targets: &[Target],
    ) -> CopyResult<()> {
        for source in collections {
            for target in targets {
                let copy = remap::remap_collection(
                    source,
                    target,
                    &self.maps.collections,
                    self.options.rename_depth,
                )?;
                let new_id = collection::Entity::insert(copy)
                    .exec(self.db)
                    .await?
                    .last_insert_id;
                self.maps.collections.insert(source.id, target.id, new_id);
                self.counts.collections += 1;
                info!(
                    "Copied collection {} '{}' -> {} for {}",
                    source.id, source.name, new_id, target.label
                );
            }
        }
        Ok(())
    }

    /// Cards and dashboards directly inside `collection_ids`; returns the source dashboard ids
    pub async fn copy_collection_items(
        &mut self,
        collection_ids: &[i32],
        targets: &[Target],
    ) -> CopyResult<Vec<i32>> {
        let mut dashboard_ids = Vec::new();

        for &collection_id in collection_ids {
            let cards = card::Entity::find()
                .filter(card::Column::CollectionId.eq(collection_id))
                .order_by_asc(card::Column::Id)
                .all(self.db)
                .await?;
            for source in &cards {
                for target in targets {
                    self.copy_card(source, target, CollectionBinding::Required)
                        .await?;
                }
            }

            let dashboards = dashboard::Entity::find()
                .filter(dashboard::Column::CollectionId.eq(collection_id))
                .order_by_asc(dashboard::Column::Id)
                .all(self.db)
                .await?;
            for source in &dashboards {
                for target in targets {
                    self.copy_dashboard(source, target).await?;
                }
                dashboard_ids.push(source.id);
            }
        }

        Ok(dashboard_ids)
    }

    /// Copy one card into `target`, or return the id of the copy this run already made
    pub async fn copy_card(
        &mut self,
        source: &card::Model,
        target: &Target,
        binding: CollectionBinding,
    ) -> CopyResult<i32> {
        if let Some(copied) = self.maps.cards.lookup(source.id, target.id) {
            debug!("Card {} already copied for {} as {}", source.id, target.label, copied);
            return Ok(copied);
        }

        let query = source
            .dataset_query_json()
            .map_err(|e| CopyError::json("report_card.dataset_query", e))?;

        self.in_progress.insert((source.id, target.id));
        let result = self.insert_card(source, &query, target, binding).await;
        self.in_progress.remove(&(source.id, target.id));

        let new_id = result?;
        self.maps.cards.insert(source.id, target.id, new_id);
        self.counts.cards += 1;
        info!(
            "Copied card {} '{}' -> {} for {}",
            source.id, source.name, new_id, target.label
        );
        Ok(new_id)
    }

    async fn insert_card(
        &mut self,
        source: &card::Model,
        query: &serde_json::Value,
        target: &Target,
        binding: CollectionBinding,
    ) -> CopyResult<i32> {
        let query = rewrite_query(self, query, target).await?;
        let table_id = match source.table_id {
            Some(table_id) => Some(self.target_table(table_id, target).await?),
            None => None,
        };
        let copy = remap::remap_card(
            source,
            target,
            &query,
            table_id,
            &self.maps.collections,
            binding,
        )?;
        Ok(card::Entity::insert(copy).exec(self.db).await?.last_insert_id)
    }

    pub async fn copy_dashboard(
        &mut self,
        source: &dashboard::Model,
        target: &Target,
    ) -> CopyResult<i32> {
        let copy = remap::remap_dashboard(source, target, &self.maps.collections)?;
        let new_id = dashboard::Entity::insert(copy)
            .exec(self.db)
            .await?
            .last_insert_id;
        self.maps.dashboards.insert(source.id, target.id, new_id);
        self.counts.dashboards += 1;
        info!(
            "Copied dashboard {} '{}' -> {} for {}",
            source.id, source.name, new_id, target.label
        );
        Ok(new_id)
    }

    /// Dashboard cards of the copied dashboards; returns the source dashboard card ids
    pub async fn copy_dashboard_cards(
        &mut self,
        dashboard_ids: &[i32],
        targets: &[Target],
    ) -> CopyResult<Vec<i32>> {
        if dashboard_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sources = dashboard_card::Entity::find()
            .filter(dashboard_card::Column::DashboardId.is_in(dashboard_ids.to_vec()))
            .order_by_asc(dashboard_card::Column::Id)
            .all(self.db)
            .await?;

        for source in &sources {
            let mappings = source
                .parameter_mappings_json()
                .map_err(|e| CopyError::json("report_dashboardcard.parameter_mappings", e))?;
            for target in targets {
                let mappings = rewrite_query(self, &mappings, target).await?;
                let copy = remap::remap_dashboard_card(
                    source,
                    target,
                    &mappings,
                    &self.maps.cards,
                    &self.maps.dashboards,
                )?;
                let new_id = dashboard_card::Entity::insert(copy)
                    .exec(self.db)
                    .await?
                    .last_insert_id;
                self.maps.dashboard_cards.insert(source.id, target.id, new_id);
                self.counts.dashboard_cards += 1;
                debug!("Copied dashboard card {} -> {} for {}", source.id, new_id, target.label);
            }
        }

        Ok(sources.iter().map(|dc| dc.id).collect())
    }

    pub async fn copy_card_series(
        &mut self,
        dashboard_card_ids: &[i32],
        targets: &[Target],
    ) -> CopyResult<()> {
        if dashboard_card_ids.is_empty() {
            return Ok(());
        }
        let sources = card_series::Entity::find()
            .filter(card_series::Column::DashboardcardId.is_in(dashboard_card_ids.to_vec()))
            .order_by_asc(card_series::Column::Id)
            .all(self.db)
            .await?;

        for source in &sources {
            for target in targets {
                let copy = remap::remap_card_series(
                    source,
                    target,
                    &self.maps.cards,
                    &self.maps.dashboard_cards,
                )?;
                card_series::Entity::insert(copy).exec(self.db).await?;
                self.counts.card_series += 1;
            }
        }
        Ok(())
    }

    /// Collection permissions on `collection_ids`, duplicated once per copy of the collection
    pub async fn copy_permissions(&mut self, collection_ids: &[i32]) -> CopyResult<()> {
        let copied: BTreeSet<i32> = collection_ids.iter().copied().collect();
        let sources: Vec<permission::Model> = permission::Entity::find()
            .filter(permission::Column::Object.starts_with("/collection/"))
            .order_by_asc(permission::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .filter(|p| {
                PermissionObject::parse(&p.object)
                    .is_some_and(|object| copied.contains(&object.collection_id))
            })
            .collect();

        for source in &sources {
            for copy in remap::remap_permission(source, &self.maps.collections)? {
                permission::Entity::insert(copy).exec(self.db).await?;
                self.counts.permissions += 1;
            }
        }
        debug!("Copied {} permissions", self.counts.permissions);
        Ok(())
    }

    async fn source_table(&mut self, table_id: i32) -> CopyResult<TableKey> {
        if let Some(key) = self.cache.table(table_id) {
            return Ok(key);
        }
        let source = table::Entity::find_by_id(table_id)
            .one(self.db)
            .await?
            .ok_or(RemapError::SourceMissing {
                kind: "table",
                id: table_id,
            })?;
        let key = TableKey {
            schema: source.schema,
            name: source.name,
        };
        self.cache.put_table(table_id, key.clone());
        Ok(key)
    }

    async fn target_table(&mut self, table_id: i32, target: &Target) -> CopyResult<i32> {
        let key = self.source_table(table_id).await?;
        if let Some(id) = self.cache.target_table(target.id, &key) {
            return Ok(id);
        }

        let mut query = table::Entity::find()
            .filter(table::Column::DbId.eq(target.id))
            .filter(table::Column::Name.eq(key.name.as_str()));
        query = match &key.schema {
            Some(schema) => query.filter(table::Column::Schema.eq(schema.as_str())),
            None => query.filter(table::Column::Schema.is_null()),
        };
        let found = query
            .order_by_asc(table::Column::Id)
            .one(self.db)
            .await?
            .ok_or(RemapError::TableNotFound {
                table_id,
                target: target.id,
            })?;

        self.cache.put_target_table(target.id, key, found.id);
        Ok(found.id)
    }

    async fn target_field(&mut self, field_id: i32, target: &Target) -> CopyResult<i32> {
        let info = match self.cache.field(field_id) {
            Some(info) => info,
            None => {
                let source = field::Entity::find_by_id(field_id)
                    .one(self.db)
                    .await?
                    .ok_or(RemapError::SourceMissing {
                        kind: "field",
                        id: field_id,
                    })?;
                let info = FieldInfo {
                    name: source.name,
                    table_id: source.table_id,
                };
                self.cache.put_field(field_id, info.clone());
                info
            }
        };

        let table_id = self.target_table(info.table_id, target).await?;
        if let Some(id) = self.cache.target_field(table_id, &info.name) {
            return Ok(id);
        }

        let found = field::Entity::find()
            .filter(field::Column::TableId.eq(table_id))
            .filter(field::Column::Name.eq(info.name.as_str()))
            .order_by_asc(field::Column::Id)
            .one(self.db)
            .await?
            .ok_or(RemapError::FieldNotFound {
                field_id,
                target: target.id,
            })?;

        self.cache.put_target_field(table_id, info.name, found.id);
        Ok(found.id)
    }
}

#[async_trait(?Send)]
impl<'a, C: ConnectionTrait> ReferenceResolver for CopyRun<'a, C> {
    async fn resolve_table(&mut self, table_id: i32, target: &Target) -> CopyResult<i32> {
        self.target_table(table_id, target).await
    }

    async fn resolve_field(&mut self, field_id: i32, target: &Target) -> CopyResult<i32> {
        self.target_field(field_id, target).await
    }

    async fn resolve_source_card(&mut self, card_id: i32, target: &Target) -> CopyResult<i32> {
        if let Some(copied) = self.maps.cards.lookup(card_id, target.id) {
            return Ok(copied);
        }
        if self.in_progress.contains(&(card_id, target.id)) {
            return Err(RemapError::NestedCardCycle {
                card_id,
                target: target.id,
            }
            .into());
        }

        match self.options.nested_cards {
            NestedCardPolicy::RequireCopied => Err(RemapError::NestedCardNotCopied {
                card_id,
                target: target.id,
            }
            .into()),
            NestedCardPolicy::AutoCopy => {
                let source = card::Entity::find_by_id(card_id)
                    .one(self.db)
                    .await?
                    .ok_or(RemapError::SourceMissing {
                        kind: "card",
                        id: card_id,
                    })?;
                info!("Copying nested card {} for {} on demand", card_id, target.label);
                let binding = match self.nested_home {
                    Some(home) => CollectionBinding::Fallback(home),
                    None => CollectionBinding::IfMapped,
                };
                self.copy_card(&source, target, binding).await
            }
        }
    }

    fn resolve_card(&self, card_id: i32, target: &Target) -> RemapResult<i32> {
        self.maps.cards.get(card_id, target.id)
    }
}
