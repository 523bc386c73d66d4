use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub async fn establish_connection(
    database_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);

    // A copy runs in one transaction, so the pool only needs a few connections
    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(opt).await
}

/// Turn a configured location into a connection URL.
///
/// Full URLs (`postgres://...`, `sqlite://...`) pass through; anything else is taken
/// as a SQLite file path, with `:memory:` selecting an in-memory database.
pub fn get_database_url(database: Option<&str>) -> String {
    match database {
        Some(":memory:") => "sqlite::memory:".to_string(),
        Some(url) if url.contains("://") || url.starts_with("sqlite:") => url.to_string(),
        Some(path) => format!("sqlite://{}?mode=rwc", path),
        None => "sqlite://metabase.db?mode=rwc".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_forms() {
        assert_eq!(get_database_url(Some(":memory:")), "sqlite::memory:");
        assert_eq!(
            get_database_url(Some("postgres://metabase@localhost/metabase")),
            "postgres://metabase@localhost/metabase"
        );
        assert_eq!(
            get_database_url(Some("data/metabase.db")),
            "sqlite://data/metabase.db?mode=rwc"
        );
        assert_eq!(get_database_url(None), "sqlite://metabase.db?mode=rwc");
    }
}
