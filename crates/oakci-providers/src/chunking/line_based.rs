//! Line-based chunking, the universal fallback.

use oakci_domain::entities::{ChunkType, CodeChunk};

/// Line chunking parameters.
#[derive(Debug, Clone)]
pub struct LineChunkingConfig {
    /// Target lines per chunk.
    pub target_lines: usize,
    /// Lines of overlap carried into the next chunk.
    pub overlap_lines: usize,
    /// Units longer than this get split even under structural chunking.
    pub max_unit_lines: usize,
}

impl Default for LineChunkingConfig {
    fn default() -> Self {
        Self {
            target_lines: 50,
            overlap_lines: 5,
            max_unit_lines: 200,
        }
    }
}

/// Splits content into fixed-size line windows with overlap.
///
/// `start_line_offset` shifts reported line numbers so oversized
/// structural units keep file-accurate positions when re-split.
#[must_use]
pub fn chunk_lines_with_offset(
    filepath: &str,
    content: &str,
    language: &str,
    config: &LineChunkingConfig,
    start_line_offset: usize,
) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let step = config.target_lines.saturating_sub(config.overlap_lines).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < lines.len() {
        let end = (start + config.target_lines).min(lines.len());
        let chunk_content = lines[start..end].join("\n");
        let start_line = start_line_offset + start + 1;
        chunks.push(CodeChunk {
            id: CodeChunk::generate_id(filepath, start_line, &chunk_content),
            content: chunk_content,
            filepath: filepath.to_owned(),
            language: language.to_owned(),
            chunk_type: ChunkType::Unknown,
            name: None,
            start_line,
            end_line: start_line_offset + end,
            docstring: None,
        });
        if end == lines.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Splits a whole file into line windows.
#[must_use]
pub fn chunk_lines(
    filepath: &str,
    content: &str,
    language: &str,
    config: &LineChunkingConfig,
) -> Vec<CodeChunk> {
    chunk_lines_with_offset(filepath, content, language, config, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_windows_cover_the_file() {
        let content = (1..=120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let config = LineChunkingConfig {
            target_lines: 50,
            overlap_lines: 5,
            max_unit_lines: 200,
        };
        let chunks = chunk_lines("big.txt", &content, "text", &config);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 50);
        // Next window starts before the previous ended (overlap).
        assert_eq!(chunks[1].start_line, 46);
        assert_eq!(chunks.last().map(|c| c.end_line), Some(120));
    }

    #[test]
    fn short_files_yield_one_chunk() {
        let chunks = chunk_lines("small.txt", "a\nb\n", "text", &LineChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, oakci_domain::entities::ChunkType::Unknown);
    }
}
