pub mod ops;
pub mod schema;

pub use ops::tree::Tree;
pub use schema::image::{ImageTable, RecordError};
pub use schema::instance::InstanceTable;
