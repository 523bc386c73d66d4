//! Helpers for tests that need a populated Metabase schema.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;

use crate::database::entities::{
    card, card_series, collection, dashboard, dashboard_card, database, field, permission, table,
};
use crate::database::migrations::Migrator;

/// In-memory SQLite database with the sandbox schema applied
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn insert_database<C: ConnectionTrait>(db: &C, name: &str) -> Result<database::Model, DbErr> {
    database::ActiveModel {
        name: Set(name.to_string()),
        engine: Set("postgres".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_table<C: ConnectionTrait>(
    db: &C,
    db_id: i32,
    schema: &str,
    name: &str,
) -> Result<table::Model, DbErr> {
    table::ActiveModel {
        db_id: Set(db_id),
        schema: Set(Some(schema.to_string())),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_field<C: ConnectionTrait>(
    db: &C,
    table_id: i32,
    name: &str,
) -> Result<field::Model, DbErr> {
    field::ActiveModel {
        table_id: Set(table_id),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_collection<C: ConnectionTrait>(
    db: &C,
    name: &str,
    location: &str,
    description: Option<&str>,
) -> Result<collection::Model, DbErr> {
    collection::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.map(str::to_string)),
        location: Set(location.to_string()),
        color: Set(Some("#509EE3".to_string())),
        archived: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_card<C: ConnectionTrait>(
    db: &C,
    name: &str,
    collection_id: Option<i32>,
    database_id: i32,
    table_id: Option<i32>,
    dataset_query: &serde_json::Value,
) -> Result<card::Model, DbErr> {
    let now = Utc::now();
    card::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        collection_id: Set(collection_id),
        database_id: Set(database_id),
        table_id: Set(table_id),
        query_type: Set(Some("query".to_string())),
        dataset_query: Set(dataset_query.to_string()),
        display: Set("table".to_string()),
        visualization_settings: Set("{}".to_string()),
        archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_dashboard<C: ConnectionTrait>(
    db: &C,
    name: &str,
    collection_id: i32,
) -> Result<dashboard::Model, DbErr> {
    let now = Utc::now();
    dashboard::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        collection_id: Set(Some(collection_id)),
        parameters: Set("[]".to_string()),
        archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_dashboard_card<C: ConnectionTrait>(
    db: &C,
    dashboard_id: i32,
    card_id: Option<i32>,
    parameter_mappings: &serde_json::Value,
) -> Result<dashboard_card::Model, DbErr> {
    let now = Utc::now();
    dashboard_card::ActiveModel {
        dashboard_id: Set(dashboard_id),
        card_id: Set(card_id),
        parameter_mappings: Set(parameter_mappings.to_string()),
        visualization_settings: Set("{}".to_string()),
        size_x: Set(4),
        size_y: Set(4),
        row: Set(0),
        col: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_card_series<C: ConnectionTrait>(
    db: &C,
    dashboardcard_id: i32,
    card_id: i32,
    position: i32,
) -> Result<card_series::Model, DbErr> {
    card_series::ActiveModel {
        dashboardcard_id: Set(dashboardcard_id),
        card_id: Set(card_id),
        position: Set(position),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn insert_permission<C: ConnectionTrait>(
    db: &C,
    object: &str,
    group_id: i32,
) -> Result<permission::Model, DbErr> {
    permission::ActiveModel {
        object: Set(object.to_string()),
        group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await
}
