pub mod config;
pub mod copy;
pub mod database;
pub mod errors;
pub mod services;
