//! Hybrid retrieval for maestro.
//!
//! A Qdrant-backed vector store fused with an in-process BM25 index.
//! The chunker and indexer turn a documentation tree into payload-rich
//! points; the engine combines both signals with RRF or min-max fusion.

pub mod bm25;
pub mod chunker;
pub mod engine;
pub mod filter;
pub mod indexer;
pub mod qdrant;

pub use bm25::{Bm25Document, Bm25Hit, Bm25Index};
pub use chunker::{chunk_markdown, chunk_text_fallback, Chunk};
pub use engine::{RetrievalEngine, RetrievalHit};
pub use filter::PayloadFilter;
pub use indexer::{DocIndexer, IndexReport};
pub use qdrant::{VectorHit, VectorStore};
