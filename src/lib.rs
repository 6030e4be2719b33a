pub mod catalog;
pub mod cli;
pub mod config;
pub mod content;
pub mod localization;
pub mod parser;
pub mod progress;
pub mod save;
pub mod schema;
pub mod stats;
pub mod ui;
pub mod writer;

pub use catalog::{load_catalogs, CatalogReport};
pub use cli::{Cli, Commands};
pub use config::LoadOptions;
pub use save::{import_save, ImportReport};
pub use stats::Stats;
pub use writer::Store;
