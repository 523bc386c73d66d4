pub mod card;
pub mod card_series;
pub mod collection;
pub mod dashboard;
pub mod dashboard_card;
pub mod database;
pub mod field;
pub mod permission;
pub mod table;
