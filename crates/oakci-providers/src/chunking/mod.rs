//! Code chunking strategies.
//!
//! Structural chunking splits at function/class/method boundaries using a
//! tree-sitter grammar when one exists for the file's extension, falling
//! back to line-based chunking on parse failure. Files without a grammar
//! go straight to line-based chunking.

pub mod languages;
pub mod line_based;
pub mod semantic;

use std::path::Path;

use oakci_domain::entities::CodeChunk;

pub use languages::{ChunkLanguage, language_for_path};
pub use line_based::{LineChunkingConfig, chunk_lines};
pub use semantic::chunk_structurally;

/// Which strategy produced a file's chunks, for the AST counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Structural (tree-sitter) chunking succeeded.
    Ast,
    /// A grammar existed but parsing failed; line chunking took over.
    AstFallback,
    /// No grammar for this extension.
    LineBased,
}

/// Chunks one file, choosing the strategy by extension.
///
/// `filepath` is the project-relative path stored in chunk ids and
/// metadata; `content` is the file text.
#[must_use]
pub fn chunk_file(
    filepath: &str,
    content: &str,
    line_config: &LineChunkingConfig,
) -> (Vec<CodeChunk>, ChunkStrategy) {
    if content.trim().is_empty() {
        return (Vec::new(), ChunkStrategy::LineBased);
    }

    match language_for_path(Path::new(filepath)) {
        Some(language) => match chunk_structurally(filepath, content, language, line_config) {
            Some(chunks) => (chunks, ChunkStrategy::Ast),
            None => (
                chunk_lines(filepath, content, language.as_str(), line_config),
                ChunkStrategy::AstFallback,
            ),
        },
        None => {
            let label = Path::new(filepath)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("text");
            (
                chunk_lines(filepath, content, label, line_config),
                ChunkStrategy::LineBased,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_files_chunk_structurally() {
        let source = "/// Adds numbers.\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\nfn sub(a: i32, b: i32) -> i32 {\n    a - b\n}\n";
        let (chunks, strategy) = chunk_file("src/math.rs", source, &LineChunkingConfig::default());
        assert_eq!(strategy, ChunkStrategy::Ast);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name.as_deref(), Some("add"));
        assert_eq!(chunks[0].docstring.as_deref(), Some("Adds numbers."));
        assert!(chunks.iter().all(|c| c.start_line >= 1));
    }

    #[test]
    fn unknown_extensions_use_line_chunking() {
        let source = "line one\nline two\nline three\n";
        let (chunks, strategy) = chunk_file("notes.xyz", source, &LineChunkingConfig::default());
        assert_eq!(strategy, ChunkStrategy::LineBased);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let (chunks, _) = chunk_file("src/empty.rs", "  \n", &LineChunkingConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunk_ids_are_unique_within_a_file() {
        let source = "fn a() {}\nfn b() {}\nfn c() {}\n";
        let (chunks, _) = chunk_file("src/three.rs", source, &LineChunkingConfig::default());
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }
}
