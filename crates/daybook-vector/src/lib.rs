//! Vector storage for chunks: a LanceDB-backed cosine collection, an
//! in-memory one, and the indexer/retriever pair built on top of either.

pub mod indexer;
pub mod lance;
pub mod memory;
pub mod retriever;
pub mod schema;
pub mod table;

pub use indexer::Indexer;
pub use lance::LanceCollection;
pub use memory::MemoryCollection;
pub use retriever::Retriever;
