use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reference data: databases, tables, fields
        manager
            .create_table(
                Table::create()
                    .table(MetabaseDatabase::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetabaseDatabase::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetabaseDatabase::Name).string().not_null())
                    .col(
                        ColumnDef::new(MetabaseDatabase::Engine)
                            .string()
                            .not_null()
                            .default("postgres"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MetabaseTable::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetabaseTable::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetabaseTable::DbId).integer().not_null())
                    .col(ColumnDef::new(MetabaseTable::Schema).string())
                    .col(ColumnDef::new(MetabaseTable::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metabase_table_db_id")
                            .from(MetabaseTable::Table, MetabaseTable::DbId)
                            .to(MetabaseDatabase::Table, MetabaseDatabase::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MetabaseField::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetabaseField::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetabaseField::TableId).integer().not_null())
                    .col(ColumnDef::new(MetabaseField::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metabase_field_table_id")
                            .from(MetabaseField::Table, MetabaseField::TableId)
                            .to(MetabaseTable::Table, MetabaseTable::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Copied artifacts
        manager
            .create_table(
                Table::create()
                    .table(Collection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Collection::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Collection::Name).string().not_null())
                    .col(ColumnDef::new(Collection::Description).text())
                    .col(
                        ColumnDef::new(Collection::Location)
                            .string()
                            .not_null()
                            .default("/"),
                    )
                    .col(ColumnDef::new(Collection::Color).string())
                    .col(
                        ColumnDef::new(Collection::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportCard::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportCard::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportCard::Name).string().not_null())
                    .col(ColumnDef::new(ReportCard::Description).text())
                    .col(ColumnDef::new(ReportCard::CollectionId).integer())
                    .col(ColumnDef::new(ReportCard::DatabaseId).integer().not_null())
                    .col(ColumnDef::new(ReportCard::TableId).integer())
                    .col(ColumnDef::new(ReportCard::QueryType).string())
                    .col(ColumnDef::new(ReportCard::DatasetQuery).text().not_null())
                    .col(ColumnDef::new(ReportCard::Display).string().not_null())
                    .col(
                        ColumnDef::new(ReportCard::VisualizationSettings)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportCard::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ReportCard::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportCard::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_card_collection_id")
                            .from(ReportCard::Table, ReportCard::CollectionId)
                            .to(Collection::Table, Collection::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_card_database_id")
                            .from(ReportCard::Table, ReportCard::DatabaseId)
                            .to(MetabaseDatabase::Table, MetabaseDatabase::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_card_table_id")
                            .from(ReportCard::Table, ReportCard::TableId)
                            .to(MetabaseTable::Table, MetabaseTable::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportDashboard::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportDashboard::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportDashboard::Name).string().not_null())
                    .col(ColumnDef::new(ReportDashboard::Description).text())
                    .col(ColumnDef::new(ReportDashboard::CollectionId).integer())
                    .col(
                        ColumnDef::new(ReportDashboard::Parameters)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboard::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ReportDashboard::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboard::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_dashboard_collection_id")
                            .from(ReportDashboard::Table, ReportDashboard::CollectionId)
                            .to(Collection::Table, Collection::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportDashboardcard::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportDashboardcard::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::DashboardId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportDashboardcard::CardId).integer())
                    .col(
                        ColumnDef::new(ReportDashboardcard::ParameterMappings)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::VisualizationSettings)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::SizeX)
                            .integer()
                            .not_null()
                            .default(4),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::SizeY)
                            .integer()
                            .not_null()
                            .default(4),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::Row)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::Col)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportDashboardcard::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_dashboardcard_dashboard_id")
                            .from(ReportDashboardcard::Table, ReportDashboardcard::DashboardId)
                            .to(ReportDashboard::Table, ReportDashboard::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_dashboardcard_card_id")
                            .from(ReportDashboardcard::Table, ReportDashboardcard::CardId)
                            .to(ReportCard::Table, ReportCard::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DashboardcardSeries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DashboardcardSeries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DashboardcardSeries::DashboardcardId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DashboardcardSeries::CardId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DashboardcardSeries::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dashboardcard_series_dashboardcard_id")
                            .from(DashboardcardSeries::Table, DashboardcardSeries::DashboardcardId)
                            .to(ReportDashboardcard::Table, ReportDashboardcard::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dashboardcard_series_card_id")
                            .from(DashboardcardSeries::Table, DashboardcardSeries::CardId)
                            .to(ReportCard::Table, ReportCard::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Permissions::Object).string().not_null())
                    .col(ColumnDef::new(Permissions::GroupId).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permissions_group_object")
                    .table(Permissions::Table)
                    .col(Permissions::GroupId)
                    .col(Permissions::Object)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DashboardcardSeries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportDashboardcard::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportDashboard::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportCard::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Collection::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MetabaseField::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MetabaseTable::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MetabaseDatabase::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MetabaseDatabase {
    Table,
    Id,
    Name,
    Engine,
}

#[derive(Iden)]
enum MetabaseTable {
    Table,
    Id,
    DbId,
    Schema,
    Name,
}

#[derive(Iden)]
enum MetabaseField {
    Table,
    Id,
    TableId,
    Name,
}

#[derive(Iden)]
enum Collection {
    Table,
    Id,
    Name,
    Description,
    Location,
    Color,
    Archived,
}

#[derive(Iden)]
enum ReportCard {
    Table,
    Id,
    Name,
    Description,
    CollectionId,
    DatabaseId,
    TableId,
    QueryType,
    DatasetQuery,
    Display,
    VisualizationSettings,
    Archived,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ReportDashboard {
    Table,
    Id,
    Name,
    Description,
    CollectionId,
    Parameters,
    Archived,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ReportDashboardcard {
    Table,
    Id,
    DashboardId,
    CardId,
    ParameterMappings,
    VisualizationSettings,
    SizeX,
    SizeY,
    Row,
    Col,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum DashboardcardSeries {
    Table,
    Id,
    DashboardcardId,
    CardId,
    Position,
}

#[derive(Iden)]
enum Permissions {
    Table,
    Id,
    Object,
    GroupId,
}
