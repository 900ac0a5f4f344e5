/// Activity and response persistence.
pub mod activity_store;
/// Identity and enrollment lookup.
pub mod directory;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
