pub mod analytics;
pub mod inventory;
pub mod message;
pub mod summary;
