//! Use cases for the OAK Codebase Intelligence daemon.
//!
//! Everything between the HTTP transport and the providers: activity
//! capture, the background processor, the code indexer, search and
//! context assembly, governance evaluation, and backup.

pub mod backup;
pub mod capture;
pub mod governance;
pub mod indexing;
pub mod processor;
pub mod search;
pub mod vector_index;
