//! Removal of previous copies and primary-key sequence maintenance

use std::collections::BTreeSet;
use std::fmt;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QuerySelect,
    Statement,
};
use tracing::{debug, info};

use super::remap::PermissionObject;
use super::targets::LabelMatcher;
use super::Target;
use crate::database::entities::{card, card_series, collection, dashboard, dashboard_card, permission};
use crate::errors::{CopyError, CopyResult};

/// Row counts removed by a teardown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub permissions: u64,
    pub card_series: u64,
    pub dashboard_cards: u64,
    pub dashboards: u64,
    pub cards: u64,
    pub collections: u64,
}

impl TeardownReport {
    pub fn total(&self) -> u64 {
        self.permissions
            + self.card_series
            + self.dashboard_cards
            + self.dashboards
            + self.cards
            + self.collections
    }
}

/// Collections left by a previous copy of `base` into `targets`.
///
/// These are the direct children of `root` named after a target database, plus their
/// descendants. The base collection and its subtree are never selected.
pub async fn previous_copies<C: ConnectionTrait>(
    db: &C,
    root: &collection::Model,
    base: &collection::Model,
    targets: &[Target],
) -> CopyResult<Vec<collection::Model>> {
    let candidates = collection::Entity::find()
        .filter(
            Condition::all()
                .add(collection::Column::Location.starts_with(root.children_location()))
                .add(collection::Column::Id.ne(base.id))
                .add(
                    Condition::any()
                        .add(collection::Column::Location.starts_with(base.children_location()))
                        .not(),
                ),
        )
        .all(db)
        .await?;

    let matchers: Vec<_> = targets.iter().map(|t| LabelMatcher::new(&t.label)).collect();
    let top_level = root.children_location();
    let prefixes: Vec<String> = candidates
        .iter()
        .filter(|c| c.location == top_level)
        .filter(|c| matchers.iter().any(|m| m.matches_exact(&c.name)))
        .map(|c| c.children_location())
        .collect();

    Ok(candidates
        .into_iter()
        .filter(|c| {
            (c.location == top_level && prefixes.contains(&c.children_location()))
                || prefixes.iter().any(|p| c.location.starts_with(p.as_str()))
        })
        .collect())
}

/// Delete `collections` and everything that depends on them, dependents first
pub async fn delete_collections<C: ConnectionTrait>(
    db: &C,
    collections: &[collection::Model],
) -> CopyResult<TeardownReport> {
    let mut report = TeardownReport::default();
    if collections.is_empty() {
        return Ok(report);
    }
    let collection_ids: BTreeSet<i32> = collections.iter().map(|c| c.id).collect();

    let permission_ids: Vec<i32> = permission::Entity::find()
        .filter(permission::Column::Object.starts_with("/collection/"))
        .all(db)
        .await?
        .into_iter()
        .filter(|p| {
            PermissionObject::parse(&p.object)
                .is_some_and(|object| collection_ids.contains(&object.collection_id))
        })
        .map(|p| p.id)
        .collect();

    let collection_ids: Vec<i32> = collection_ids.into_iter().collect();
    let card_ids: Vec<i32> = card::Entity::find()
        .filter(card::Column::CollectionId.is_in(collection_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let dashboard_ids: Vec<i32> = dashboard::Entity::find()
        .filter(dashboard::Column::CollectionId.is_in(collection_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    let dashboard_card_ids: Vec<i32> = dashboard_card::Entity::find()
        .filter(
            Condition::any()
                .add(dashboard_card::Column::DashboardId.is_in(dashboard_ids.clone()))
                .add(dashboard_card::Column::CardId.is_in(card_ids.clone())),
        )
        .all(db)
        .await?
        .into_iter()
        .map(|dc| dc.id)
        .collect();
    let series_ids: Vec<i32> = card_series::Entity::find()
        .filter(
            Condition::any()
                .add(card_series::Column::DashboardcardId.is_in(dashboard_card_ids.clone()))
                .add(card_series::Column::CardId.is_in(card_ids.clone())),
        )
        .all(db)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    report.permissions = permission::Entity::delete_many()
        .filter(permission::Column::Id.is_in(permission_ids))
        .exec(db)
        .await?
        .rows_affected;
    report.card_series = card_series::Entity::delete_many()
        .filter(card_series::Column::Id.is_in(series_ids))
        .exec(db)
        .await?
        .rows_affected;
    report.dashboard_cards = dashboard_card::Entity::delete_many()
        .filter(dashboard_card::Column::Id.is_in(dashboard_card_ids))
        .exec(db)
        .await?
        .rows_affected;
    report.dashboards = dashboard::Entity::delete_many()
        .filter(dashboard::Column::Id.is_in(dashboard_ids))
        .exec(db)
        .await?
        .rows_affected;
    report.cards = card::Entity::delete_many()
        .filter(card::Column::Id.is_in(card_ids))
        .exec(db)
        .await?
        .rows_affected;
    report.collections = collection::Entity::delete_many()
        .filter(collection::Column::Id.is_in(collection_ids))
        .exec(db)
        .await?
        .rows_affected;

    info!(
        "Removed previous copies: {} collections, {} cards, {} dashboards, {} dashboard cards, {} series, {} permissions",
        report.collections,
        report.cards,
        report.dashboards,
        report.dashboard_cards,
        report.card_series,
        report.permissions
    );
    Ok(report)
}

/// Tables whose primary keys a copy allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencedTable {
    Collection,
    Card,
    Dashboard,
    DashboardCard,
    CardSeries,
    Permission,
}

impl SequencedTable {
    pub const ALL: [SequencedTable; 6] = [
        SequencedTable::Collection,
        SequencedTable::Card,
        SequencedTable::Dashboard,
        SequencedTable::DashboardCard,
        SequencedTable::CardSeries,
        SequencedTable::Permission,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            SequencedTable::Collection => "collection",
            SequencedTable::Card => "report_card",
            SequencedTable::Dashboard => "report_dashboard",
            SequencedTable::DashboardCard => "report_dashboardcard",
            SequencedTable::CardSeries => "dashboardcard_series",
            SequencedTable::Permission => "permissions",
        }
    }

    async fn max_id<C: ConnectionTrait>(&self, db: &C) -> CopyResult<i64> {
        let max = match self {
            SequencedTable::Collection => max_id::<collection::Entity, _>(db, collection::Column::Id).await?,
            SequencedTable::Card => max_id::<card::Entity, _>(db, card::Column::Id).await?,
            SequencedTable::Dashboard => max_id::<dashboard::Entity, _>(db, dashboard::Column::Id).await?,
            SequencedTable::DashboardCard => {
                max_id::<dashboard_card::Entity, _>(db, dashboard_card::Column::Id).await?
            }
            SequencedTable::CardSeries => {
                max_id::<card_series::Entity, _>(db, card_series::Column::Id).await?
            }
            SequencedTable::Permission => {
                max_id::<permission::Entity, _>(db, permission::Column::Id).await?
            }
        };
        Ok(max.map(i64::from).unwrap_or(0))
    }
}

impl fmt::Display for SequencedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

async fn max_id<E, C>(db: &C, column: E::Column) -> CopyResult<Option<i32>>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let max = E::find()
        .select_only()
        .column_as(Expr::col(column).max(), "max_id")
        .into_tuple::<Option<i32>>()
        .one(db)
        .await?;
    Ok(max.flatten())
}

/// Advance every copied table's id sequence past both its current maximum id and its
/// current value, plus `margin`.
///
/// The sequence never moves backwards, so ids of rows removed by a teardown are not handed
/// out again. Returns the last id handed out per table; the next insert gets that value plus one.
pub async fn reset_sequences<C: ConnectionTrait>(
    db: &C,
    margin: i64,
) -> CopyResult<Vec<(SequencedTable, i64)>> {
    let backend = db.get_database_backend();
    let mut reset = Vec::with_capacity(SequencedTable::ALL.len());

    for table in SequencedTable::ALL {
        let name = table.table_name();
        let max_id = table.max_id(db).await?;
        let current = current_sequence(db, name).await?;
        let value = match backend {
            DbBackend::Sqlite => {
                let value = max_id.max(current) + margin;
                db.execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM sqlite_sequence WHERE name = ?",
                    [name.into()],
                ))
                .await?;
                db.execute(Statement::from_sql_and_values(
                    backend,
                    "INSERT INTO sqlite_sequence (name, seq) VALUES (?, ?)",
                    [name.into(), value.into()],
                ))
                .await?;
                value
            }
            DbBackend::Postgres => {
                // setval rejects values below the sequence minimum of 1
                let value = (max_id.max(current) + margin).max(1);
                db.query_one(Statement::from_sql_and_values(
                    backend,
                    "SELECT setval(pg_get_serial_sequence($1, 'id'), $2)",
                    [name.into(), value.into()],
                ))
                .await?;
                value
            }
            other => return Err(CopyError::Unsupported(format!("{:?}", other))),
        };
        debug!(
            "Sequence for {} set to {} (max id {}, was {})",
            table, value, max_id, current
        );
        reset.push((table, value));
    }

    Ok(reset)
}

/// The last id the sequence of `table` handed out, 0 when it never did
async fn current_sequence<C: ConnectionTrait>(db: &C, table: &str) -> CopyResult<i64> {
    let backend = db.get_database_backend();
    let (sql, column) = match backend {
        DbBackend::Sqlite => ("SELECT seq FROM sqlite_sequence WHERE name = ?", "seq"),
        DbBackend::Postgres => (
            "SELECT COALESCE(pg_sequence_last_value(pg_get_serial_sequence($1, 'id')::regclass), 0)::bigint AS last_value",
            "last_value",
        ),
        other => return Err(CopyError::Unsupported(format!("{:?}", other))),
    };
    let row = db
        .query_one(Statement::from_sql_and_values(backend, sql, [table.into()]))
        .await?;
    match row {
        Some(row) => Ok(row.try_get::<Option<i64>>("", column)?.unwrap_or(0)),
        None => Ok(0),
    }
}
