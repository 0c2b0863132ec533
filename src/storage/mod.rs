//! Storage implementations for the document store and the search index

pub mod elasticsearch;
pub mod in_memory;
pub mod mongodb;

pub use elasticsearch::ElasticOrderIndex;
pub use in_memory::{InMemoryOrderIndex, InMemoryOrderStore};
pub use self::mongodb::MongoOrderStore;
