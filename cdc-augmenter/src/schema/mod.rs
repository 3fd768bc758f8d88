mod active;
mod cache;
pub mod ddl;
mod source;

pub use active::ActiveSchemaSource;
pub use cache::SchemaCache;
pub use source::SchemaSource;
