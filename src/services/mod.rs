pub mod copy_service;

pub use copy_service::*;
