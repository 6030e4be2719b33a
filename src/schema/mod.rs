pub mod migrations;
pub mod tables;
pub mod types;
pub mod views;

pub use migrations::{ensure_schema, MigrationError, SchemaStatus, SCHEMA_VERSION};
pub use tables::*;
pub use types::*;
pub use views::ALL_VIEWS;
