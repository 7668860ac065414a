//! Provider implementations for the OAK Codebase Intelligence daemon.
//!
//! Concrete adapters behind the domain ports: the SQLite activity store,
//! the embedding provider chain, the filesystem vector store, language
//! chunkers, and the OpenAI-compatible summarization client.

pub mod chunking;
pub mod database;
pub mod embedding;
pub mod llm;
pub mod vector_store;
