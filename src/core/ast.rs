//! Entity extraction using tree-sitter
//!
//! Drop-in replacement for the heuristic extractor on Rust, Python,
//! JavaScript and TypeScript. Produces the same node contract: file node
//! first, then declarations with their full bodies and long comments.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::core::parser::{self, EntityExtractor, ExtractorRegistry, Language};
use crate::error::{ContextError, Result};
use crate::index::node::{ContextNode, NodeKind};

/// Languages with a bundled grammar
const SUPPORTED: [Language; 4] = [
    Language::Rust,
    Language::Python,
    Language::JavaScript,
    Language::TypeScript,
];

/// AST-backed extractor for one language
pub struct AstExtractor {
    language: Language,
    preview_chars: usize,
}

impl AstExtractor {
    pub fn new(language: Language, preview_chars: usize) -> Self {
        Self {
            language,
            preview_chars,
        }
    }

    /// Register AST extractors for every language with a bundled grammar
    pub fn install(registry: &mut ExtractorRegistry, preview_chars: usize) {
        for language in SUPPORTED {
            registry.register(language, std::sync::Arc::new(Self::new(language, preview_chars)));
        }
    }

    fn parser_for(&self, path: &str) -> Result<Parser> {
        let grammar = match self.language {
            Language::Rust => tree_sitter_rust::language(),
            Language::Python => tree_sitter_python::language(),
            Language::JavaScript => tree_sitter_javascript::language(),
            Language::TypeScript => {
                let tsx = Path::new(path)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"));
                if tsx {
                    tree_sitter_typescript::language_tsx()
                } else {
                    tree_sitter_typescript::language_typescript()
                }
            }
            other => {
                return Err(ContextError::extraction(path, format!("no grammar for {other}")));
            }
        };

        let mut parser = Parser::new();
        parser
            .set_language(grammar)
            .map_err(|e| ContextError::extraction(path, e.to_string()))?;
        Ok(parser)
    }
}

impl EntityExtractor for AstExtractor {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn extract(&self, path: &str, content: &str) -> Result<Vec<ContextNode>> {
        let mut parser = self.parser_for(path)?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ContextError::extraction(path, "tree-sitter parsing failed"))?;

        let mut walker = Walker {
            path,
            content,
            language: self.language,
            entities: Vec::new(),
            comments: Vec::new(),
        };
        walker.walk(tree.root_node());
        walker.flush_comments();

        let file = parser::file_node(
            path,
            content,
            self.preview_chars,
            parser::parse_imports(self.language, content),
        );
        Ok(parser::assemble(file, walker.entities))
    }
}

struct Walker<'a> {
    path: &'a str,
    content: &'a str,
    language: Language,
    entities: Vec<ContextNode>,
    /// Pending run of adjacent comment nodes (start row, end row, text span)
    comments: Vec<(usize, usize, usize, usize)>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, node: Node) {
        let kind = node.kind();

        if kind.contains("comment") {
            self.push_comment(node);
            return;
        }

        let entity = match self.language {
            Language::Rust => self.rust_entity(node, kind),
            Language::Python => self.python_entity(node, kind),
            Language::JavaScript | Language::TypeScript => self.js_entity(node, kind),
            _ => None,
        };
        if let Some(entity) = entity {
            self.entities.push(entity);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn rust_entity(&self, node: Node, kind: &str) -> Option<ContextNode> {
        match kind {
            "function_item" | "function_signature_item" => self.named(node, "name", NodeKind::Function),
            "struct_item" | "enum_item" | "trait_item" | "union_item" => self.named(node, "name", NodeKind::Class),
            "impl_item" => {
                let target = node.child_by_field_name("type")?;
                Some(self.entity(node, NodeKind::Class, format!("impl {}", self.text(target))))
            }
            _ => None,
        }
    }

    fn python_entity(&self, node: Node, kind: &str) -> Option<ContextNode> {
        match kind {
            "function_definition" => self.named(node, "name", NodeKind::Function),
            "class_definition" => self.named(node, "name", NodeKind::Class),
            _ => None,
        }
    }

    fn js_entity(&self, node: Node, kind: &str) -> Option<ContextNode> {
        match kind {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                self.named(node, "name", NodeKind::Function)
            }
            "class_declaration" | "abstract_class_declaration" | "interface_declaration"
            | "type_alias_declaration" | "enum_declaration" => self.named(node, "name", NodeKind::Class),
            "variable_declarator" => {
                let value = node.child_by_field_name("value")?;
                if !matches!(value.kind(), "arrow_function" | "function" | "function_expression") {
                    return None;
                }
                let name = self.text(node.child_by_field_name("name")?);
                let statement = node.parent().unwrap_or(node);
                Some(self.entity(statement, NodeKind::Function, name))
            }
            _ => None,
        }
    }

    fn named(&self, node: Node, field: &str, kind: NodeKind) -> Option<ContextNode> {
        let name = self.text(node.child_by_field_name(field)?);
        Some(self.entity(node, kind, name))
    }

    fn entity(&self, node: Node, kind: NodeKind, name: String) -> ContextNode {
        ContextNode::new(kind, self.path, name, self.text(node)).with_lines(
            node.start_position().row + 1,
            node.end_position().row + 1,
        )
    }

    fn text(&self, node: Node) -> String {
        self.content[node.byte_range()].to_string()
    }

    fn push_comment(&mut self, node: Node) {
        let (start, end) = (node.start_position().row, node.end_position().row);
        let range = node.byte_range();
        if let Some(run) = self.comments.last_mut() {
            if start <= run.1 + 1 {
                run.1 = end;
                run.3 = range.end;
                return;
            }
        }
        self.flush_comments();
        self.comments.push((start, end, range.start, range.end));
    }

    fn flush_comments(&mut self) {
        for (start, end, from, to) in self.comments.drain(..) {
            let text = &self.content[from..to];
            if let Some(node) = parser::comment_node(self.path, text, start + 1, end + 1) {
                self.entities.push(node);
            }
        }
    }
}
