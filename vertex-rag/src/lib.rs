pub mod client;
pub mod engine;
pub mod operations;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;

pub use client::VertexRagClient;
pub use engine::{ChunkingOptions, GenerationOptions, ImportOutcome, RagAnswer, RagEngine};
