//! Grammar loading and parsing for C# sources.

use std::fmt;
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{ModelError, Result};

/// The tree-sitter C# grammar.
pub fn language() -> Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

/// Whether `path` looks like a C# source file.
pub fn is_source_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("cs")
}

/// A parsed C# document: origin, text and syntax tree.
pub struct SourceTree {
    path: String,
    text: String,
    tree: Tree,
}

impl SourceTree {
    /// Parse `text`. Syntax errors are kept in the tree as `ERROR` nodes;
    /// only a grammar or parser failure is an error.
    pub fn parse(path: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let text = text.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language())
            .map_err(|e| ModelError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let tree = parser.parse(&text, None).ok_or_else(|| ModelError::Parse {
            path: path.clone(),
            message: "parser returned no tree".to_string(),
        })?;
        Ok(Self { path, text, tree })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.root().has_error()
    }
}

impl fmt::Debug for SourceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTree")
            .field("path", &self.path)
            .field("len", &self.text.len())
            .finish()
    }
}
