//! Storage implementations for the newsdesk library.
//!
//! Available backends:
//! - `MemoryStore` - In-memory articles and vectors (always available)
//! - `PineconeIndex` - Pinecone vector index (requires `pinecone` feature)

pub mod memory;

#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use memory::MemoryStore;

#[cfg(feature = "pinecone")]
pub use pinecone::PineconeIndex;
