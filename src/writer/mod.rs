pub mod schema_gen;
pub mod sqlite;

pub use sqlite::{Batch, Store, BATCH_SIZE};
