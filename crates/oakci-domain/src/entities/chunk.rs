//! Code chunk and vector-store document definitions.

use serde::{Deserialize, Serialize};

use crate::utils::hash::sha256_hex;

/// Structural kind of a code chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Method,
    Module,
    Unknown,
}

impl ChunkType {
    /// String form stored in vector metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Module => "module",
            Self::Unknown => "unknown",
        }
    }
}

/// Document family a file belongs to, classified from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Code,
    I18n,
    Config,
    Test,
    Docs,
}

impl DocType {
    /// String form stored in vector metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::I18n => "i18n",
            Self::Config => "config",
            Self::Test => "test",
            Self::Docs => "docs",
        }
    }
}

/// A chunk of code prepared for indexing.
///
/// The embedding document carries semantic anchors (file, symbol, kind,
/// language, docstring) ahead of the raw code; the stored document is the
/// raw code alone so retrieval returns what a reader expects to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Deterministic id: `{filepath}:{start_line}:{sha256(content)[..12]}`.
    pub id: String,
    /// Raw chunk content.
    pub content: String,
    /// Project-relative file path.
    pub filepath: String,
    /// Language label.
    pub language: String,
    /// Structural kind.
    pub chunk_type: ChunkType,
    /// Symbol name when structural chunking found one.
    pub name: Option<String>,
    /// 1-based start line.
    pub start_line: usize,
    /// 1-based end line.
    pub end_line: usize,
    /// Doc comment attached to the symbol.
    pub docstring: Option<String>,
}

impl CodeChunk {
    /// Generates the stable chunk id.
    #[must_use]
    pub fn generate_id(filepath: &str, start_line: usize, content: &str) -> String {
        let digest = sha256_hex(content);
        format!("{filepath}:{start_line}:{}", &digest[..12])
    }

    /// Rough token estimate (~4 chars per token).
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.content.len() / 4
    }

    /// Just the file name from the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.filepath.rsplit('/').next().unwrap_or(&self.filepath)
    }

    /// Document family for doc-type-aware result weighting.
    #[must_use]
    pub fn doc_type(&self) -> DocType {
        classify_doc_type(&self.filepath)
    }

    /// Document envelope used for embedding.
    ///
    /// Includes the metadata developers naturally search for so that the
    /// vector carries more signal than the raw code alone.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("file: {}", self.file_name())];
        if let Some(name) = &self.name {
            parts.push(format!("symbol: {name}"));
        }
        parts.push(format!("kind: {}", self.chunk_type.as_str()));
        parts.push(format!("language: {}", self.language));
        parts.push("---".to_owned());
        if let Some(doc) = &self.docstring {
            parts.push(doc.trim().to_owned());
            parts.push("---".to_owned());
        }
        parts.push(self.content.clone());
        parts.join("\n")
    }
}

/// Classifies a file path into a document family.
#[must_use]
pub fn classify_doc_type(filepath: &str) -> DocType {
    let lower = filepath.to_lowercase();
    if lower.contains("/test") || lower.contains("_test.") || lower.contains(".test.") || lower.starts_with("tests/") {
        return DocType::Test;
    }
    if lower.contains("/locale") || lower.contains("/i18n") || lower.contains("/translations") {
        return DocType::I18n;
    }
    if lower.ends_with(".md") || lower.ends_with(".rst") || lower.contains("/docs/") {
        return DocType::Docs;
    }
    if lower.ends_with(".json")
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
        || lower.ends_with(".toml")
        || lower.ends_with(".ini")
    {
        return DocType::Config;
    }
    DocType::Code
}

/// A plan indexed into the memory collection with `memory_type=plan`.
#[derive(Debug, Clone)]
pub struct PlanDocument {
    pub id: String,
    pub session_id: String,
    /// From the plan file stem or the first markdown heading.
    pub title: String,
    pub content: String,
    pub file_path: Option<String>,
    pub created_at: String,
}

impl PlanDocument {
    /// Plans are already prose; embed them whole behind a title prefix.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("Plan: {}\n\n{}", self.title, self.content)
    }
}

/// A session summary indexed into the session-summaries collection.
#[derive(Debug, Clone)]
pub struct SessionSummaryDocument {
    pub session_id: String,
    pub title: Option<String>,
    pub summary: String,
    pub project_root: String,
    pub agent: String,
    pub created_at_epoch: i64,
}

impl SessionSummaryDocument {
    /// Embedded text, with a generic prefix when the session has no title.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => {
                format!("Session: {title}\n\n{}", self.summary)
            }
            _ => format!("Session summary\n\n{}", self.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable_and_unique_per_location() {
        let a = CodeChunk::generate_id("src/lib.rs", 10, "fn a() {}");
        let b = CodeChunk::generate_id("src/lib.rs", 10, "fn a() {}");
        let c = CodeChunk::generate_id("src/lib.rs", 20, "fn a() {}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("src/lib.rs:10:"));
    }

    #[test]
    fn doc_type_classification() {
        assert_eq!(classify_doc_type("src/main.rs"), DocType::Code);
        assert_eq!(classify_doc_type("tests/api.rs"), DocType::Test);
        assert_eq!(classify_doc_type("config/app.toml"), DocType::Config);
        assert_eq!(classify_doc_type("docs/guide.md"), DocType::Docs);
        assert_eq!(classify_doc_type("web/i18n/en.json"), DocType::I18n);
    }

    #[test]
    fn embedding_envelope_includes_anchors() {
        let chunk = CodeChunk {
            id: "x".to_owned(),
            content: "fn parse() {}".to_owned(),
            filepath: "src/parser.rs".to_owned(),
            language: "rust".to_owned(),
            chunk_type: ChunkType::Function,
            name: Some("parse".to_owned()),
            start_line: 1,
            end_line: 1,
            docstring: Some("Parses input.".to_owned()),
        };
        let text = chunk.embedding_text();
        assert!(text.contains("file: parser.rs"));
        assert!(text.contains("symbol: parse"));
        assert!(text.contains("kind: function"));
        assert!(text.contains("Parses input."));
        assert!(text.ends_with("fn parse() {}"));
    }
}
