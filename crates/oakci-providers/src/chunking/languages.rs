//! Grammar registry for structural chunking.

use std::path::Path;

/// Languages with a bundled tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLanguage {
    #[cfg(feature = "lang-rust")]
    Rust,
    #[cfg(feature = "lang-python")]
    Python,
    #[cfg(feature = "lang-javascript")]
    JavaScript,
    #[cfg(feature = "lang-typescript")]
    TypeScript,
    #[cfg(feature = "lang-go")]
    Go,
}

impl ChunkLanguage {
    /// Language label stored in chunk metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => "rust",
            #[cfg(feature = "lang-python")]
            Self::Python => "python",
            #[cfg(feature = "lang-javascript")]
            Self::JavaScript => "javascript",
            #[cfg(feature = "lang-typescript")]
            Self::TypeScript => "typescript",
            #[cfg(feature = "lang-go")]
            Self::Go => "go",
        }
    }

    /// The tree-sitter grammar for this language.
    #[must_use]
    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            #[cfg(feature = "lang-python")]
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            #[cfg(feature = "lang-javascript")]
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            #[cfg(feature = "lang-typescript")]
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            #[cfg(feature = "lang-go")]
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

/// Grammar for a file, by extension.
#[must_use]
pub fn language_for_path(path: &Path) -> Option<ChunkLanguage> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        #[cfg(feature = "lang-rust")]
        "rs" => Some(ChunkLanguage::Rust),
        #[cfg(feature = "lang-python")]
        "py" | "pyi" => Some(ChunkLanguage::Python),
        #[cfg(feature = "lang-javascript")]
        "js" | "jsx" | "mjs" | "cjs" => Some(ChunkLanguage::JavaScript),
        #[cfg(feature = "lang-typescript")]
        "ts" | "tsx" | "mts" | "cts" => Some(ChunkLanguage::TypeScript),
        #[cfg(feature = "lang-go")]
        "go" => Some(ChunkLanguage::Go),
        _ => None,
    }
}

/// Extensions the indexer walks, grammar-backed or not.
pub const INDEXABLE_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "go", "java", "c",
    "h", "cpp", "cc", "hpp", "cs", "rb", "php", "swift", "kt", "scala", "sh", "sql", "md", "toml",
    "yaml", "yml", "json",
];

/// Whether the indexer should consider a file at all.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            INDEXABLE_EXTENSIONS.contains(&lower.as_str())
        })
}
