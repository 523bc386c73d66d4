pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_metabase_schema;

/// Creates the subset of the Metabase application schema that metacopy reads and writes.
///
/// Production runs point at an existing Metabase database and never migrate it; the
/// migrator backs `metacopy db init` sandboxes and the test-suite.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_create_metabase_schema::Migration)]
    }
}

#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn migrate_database(
    db: &sea_orm::DatabaseConnection,
    direction: MigrateDirection,
) -> Result<(), DbErr> {
    match direction {
        MigrateDirection::Up => {
            tracing::info!("Running migrations up");
            Migrator::up(db, None).await?;
        }
        MigrateDirection::Down => {
            tracing::info!("Running migrations down");
            Migrator::down(db, None).await?;
        }
        MigrateDirection::Fresh => {
            tracing::info!("Running fresh migrations (down then up)");
            Migrator::down(db, None).await?;
            Migrator::up(db, None).await?;
        }
    }
    tracing::info!("Database migration completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::collection;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_fresh_migration_empties_schema() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        migrate_database(&db, MigrateDirection::Up).await.unwrap();
        crate::database::test_utils::insert_collection(&db, "Environments", "/", None)
            .await
            .unwrap();

        migrate_database(&db, MigrateDirection::Fresh).await.unwrap();
        assert!(collection::Entity::find().all(&db).await.unwrap().is_empty());
    }
}
