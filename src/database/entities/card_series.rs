use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dashboardcard_series")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub dashboardcard_id: i32,
    pub card_id: i32,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dashboard_card::Entity",
        from = "Column::DashboardcardId",
        to = "super::dashboard_card::Column::Id"
    )]
    DashboardCard,
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::CardId",
        to = "super::card::Column::Id"
    )]
    Card,
}

impl Related<super::dashboard_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DashboardCard.def()
    }
}

impl Related<super::card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Card.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
