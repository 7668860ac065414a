//! Structural chunking via tree-sitter.
//!
//! Splits a file at function/class/method boundaries so each chunk is one
//! semantic unit. Oversized units are re-split line-based with overlap
//! (their ids stay unique because ids include the start line and content
//! hash). Returns `None` when the parse fails so the caller can fall back.

use oakci_domain::entities::{ChunkType, CodeChunk};
use tree_sitter::{Node, Parser};

use super::languages::ChunkLanguage;
use super::line_based::{LineChunkingConfig, chunk_lines_with_offset};

/// Node kinds harvested per grammar, with the chunk type they map to.
fn node_kinds(language: ChunkLanguage) -> &'static [(&'static str, ChunkType)] {
    match language {
        #[cfg(feature = "lang-rust")]
        ChunkLanguage::Rust => &[
            ("function_item", ChunkType::Function),
            ("struct_item", ChunkType::Class),
            ("enum_item", ChunkType::Class),
            ("trait_item", ChunkType::Class),
        ],
        #[cfg(feature = "lang-python")]
        ChunkLanguage::Python => &[
            ("function_definition", ChunkType::Function),
            ("class_definition", ChunkType::Class),
        ],
        #[cfg(feature = "lang-javascript")]
        ChunkLanguage::JavaScript => &[
            ("function_declaration", ChunkType::Function),
            ("generator_function_declaration", ChunkType::Function),
            ("class_declaration", ChunkType::Class),
            ("method_definition", ChunkType::Method),
        ],
        #[cfg(feature = "lang-typescript")]
        ChunkLanguage::TypeScript => &[
            ("function_declaration", ChunkType::Function),
            ("class_declaration", ChunkType::Class),
            ("method_definition", ChunkType::Method),
            ("interface_declaration", ChunkType::Class),
        ],
        #[cfg(feature = "lang-go")]
        ChunkLanguage::Go => &[
            ("function_declaration", ChunkType::Function),
            ("method_declaration", ChunkType::Method),
            ("type_declaration", ChunkType::Class),
        ],
    }
}

/// Container kinds descended into instead of chunked whole.
fn container_kinds(language: ChunkLanguage) -> &'static [&'static str] {
    match language {
        #[cfg(feature = "lang-rust")]
        ChunkLanguage::Rust => &["impl_item", "mod_item", "declaration_list"],
        #[cfg(feature = "lang-python")]
        ChunkLanguage::Python => &["decorated_definition"],
        #[cfg(feature = "lang-javascript")]
        ChunkLanguage::JavaScript => &["export_statement"],
        #[cfg(feature = "lang-typescript")]
        ChunkLanguage::TypeScript => &["export_statement"],
        #[cfg(feature = "lang-go")]
        ChunkLanguage::Go => &[],
    }
}

fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    source
        .get(name_node.byte_range())
        .map(|s| s.trim().to_owned())
}

/// Doc comment from the comment lines immediately above a node.
fn leading_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut sibling = node.prev_sibling();
    let mut expected_row = node.start_position().row;
    while let Some(prev) = sibling {
        if !prev.kind().contains("comment") {
            break;
        }
        if prev.end_position().row + 1 != expected_row {
            break;
        }
        let text = source.get(prev.byte_range())?.trim();
        let cleaned = text
            .trim_start_matches("///")
            .trim_start_matches("//!")
            .trim_start_matches("//")
            .trim_start_matches('#')
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .trim();
        lines.push(cleaned.to_owned());
        expected_row = prev.start_position().row;
        sibling = prev.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

fn collect_units<'t>(
    node: Node<'t>,
    language: ChunkLanguage,
    units: &mut Vec<(Node<'t>, ChunkType)>,
) {
    let kinds = node_kinds(language);
    let containers = container_kinds(language);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some((_, chunk_type)) = kinds.iter().find(|(kind, _)| *kind == child.kind()) {
            units.push((child, *chunk_type));
            // Descend into type bodies so methods become their own chunks.
            if matches!(chunk_type, ChunkType::Class) {
                collect_units(child, language, units);
            }
        } else if containers.contains(&child.kind()) {
            collect_units(child, language, units);
        }
    }
}

/// Structural chunking entry point; `None` means parse failure.
#[must_use]
pub fn chunk_structurally(
    filepath: &str,
    content: &str,
    language: ChunkLanguage,
    line_config: &LineChunkingConfig,
) -> Option<Vec<CodeChunk>> {
    let mut parser = Parser::new();
    parser.set_language(&language.grammar()).ok()?;
    let tree = parser.parse(content, None)?;
    let root = tree.root_node();
    if root.has_error() && root.child_count() == 0 {
        return None;
    }

    let mut units = Vec::new();
    collect_units(root, language, &mut units);

    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    for (node, chunk_type) in units {
        let start_row = node.start_position().row;
        let end_row = node.end_position().row.min(lines.len().saturating_sub(1));
        if start_row > end_row {
            continue;
        }
        let unit_content = lines[start_row..=end_row].join("\n");
        let line_count = end_row - start_row + 1;

        if line_count > line_config.max_unit_lines {
            // Too large for one vector; re-split with file-accurate lines.
            chunks.extend(chunk_lines_with_offset(
                filepath,
                &unit_content,
                language.as_str(),
                line_config,
                start_row,
            ));
            continue;
        }

        let start_line = start_row + 1;
        chunks.push(CodeChunk {
            id: CodeChunk::generate_id(filepath, start_line, &unit_content),
            content: unit_content,
            filepath: filepath.to_owned(),
            language: language.as_str().to_owned(),
            chunk_type,
            name: node_name(node, content),
            start_line,
            end_line: end_row + 1,
            docstring: leading_docstring(node, content),
        });
    }

    // No recognizable units: whole file as one module chunk.
    if chunks.is_empty() && !lines.is_empty() {
        chunks.push(CodeChunk {
            id: CodeChunk::generate_id(filepath, 1, content),
            content: content.to_owned(),
            filepath: filepath.to_owned(),
            language: language.as_str().to_owned(),
            chunk_type: ChunkType::Module,
            name: filepath.rsplit('/').next().map(str::to_owned),
            start_line: 1,
            end_line: lines.len(),
            docstring: None,
        });
    }

    chunks.sort_by_key(|c| c.start_line);
    // Overlap on oversized units can duplicate ids; drop the duplicates.
    let mut seen = std::collections::HashSet::new();
    chunks.retain(|c| seen.insert(c.id.clone()));
    Some(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "lang-rust")]
    #[test]
    fn methods_inside_impl_blocks_are_chunked() {
        let source = "struct Point { x: i32 }\n\nimpl Point {\n    fn x(&self) -> i32 {\n        self.x\n    }\n}\n";
        let chunks = chunk_structurally(
            "src/point.rs",
            source,
            ChunkLanguage::Rust,
            &LineChunkingConfig::default(),
        )
        .expect("parse");
        let names: Vec<Option<&str>> = chunks.iter().map(|c| c.name.as_deref()).collect();
        assert!(names.contains(&Some("Point")));
        assert!(names.contains(&Some("x")));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn python_classes_and_functions_are_found() {
        let source = "class Greeter:\n    def greet(self):\n        return 'hi'\n\ndef main():\n    pass\n";
        let chunks = chunk_structurally(
            "app/main.py",
            source,
            ChunkLanguage::Python,
            &LineChunkingConfig::default(),
        )
        .expect("parse");
        let names: Vec<Option<&str>> = chunks.iter().map(|c| c.name.as_deref()).collect();
        assert!(names.contains(&Some("Greeter")));
        assert!(names.contains(&Some("main")));
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn oversized_units_are_resplit_with_accurate_lines() {
        let mut body = String::from("fn huge() {\n");
        for i in 0..300 {
            body.push_str(&format!("    let v{i} = {i};\n"));
        }
        body.push_str("}\n");
        let config = LineChunkingConfig {
            target_lines: 50,
            overlap_lines: 5,
            max_unit_lines: 100,
        };
        let chunks =
            chunk_structurally("src/huge.rs", &body, ChunkLanguage::Rust, &config).expect("parse");
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_line, 1);
        let mut seen = std::collections::HashSet::new();
        assert!(chunks.iter().all(|c| seen.insert(c.id.clone())));
    }
}
