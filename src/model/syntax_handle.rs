//! Lazy handles to syntax nodes.
//!
//! A handle either points into a parsed [`SourceTree`] (shared tree, byte
//! range and node kind) or carries a C# snippet synthesized from metadata,
//! parsed with the same grammar the first time a node is requested.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use tree_sitter::Node;

use crate::parser::SourceTree;

/// Placeholder type used to host synthesized members and attributes.
const HOST_TYPE: &str = "__Synthesized";

#[derive(Clone)]
pub struct SyntaxHandle {
    inner: Rc<Inner>,
}

enum Inner {
    Parsed {
        tree: Rc<SourceTree>,
        start: usize,
        end: usize,
        kind: &'static str,
    },
    Synthesized {
        snippet: String,
        kind: &'static str,
        document: OnceCell<Option<(Rc<SourceTree>, usize)>>,
    },
}

impl SyntaxHandle {
    /// Handle to a node of an already parsed tree.
    pub fn parsed(tree: &Rc<SourceTree>, node: Node<'_>) -> Self {
        Self {
            inner: Rc::new(Inner::Parsed {
                tree: Rc::clone(tree),
                start: node.start_byte(),
                end: node.end_byte(),
                kind: node.kind(),
            }),
        }
    }

    /// Handle to a snippet that parses to a node of `kind`.
    ///
    /// Attribute snippets omit the surrounding brackets (`Pattern(typeof(X))`);
    /// member snippets are complete declarations (`public int Count { get; }`).
    pub fn synthesized(snippet: impl Into<String>, kind: &'static str) -> Self {
        Self {
            inner: Rc::new(Inner::Synthesized {
                snippet: snippet.into(),
                kind,
                document: OnceCell::new(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match &*self.inner {
            Inner::Parsed { kind, .. } | Inner::Synthesized { kind, .. } => kind,
        }
    }

    /// Source text of the node. Never parses.
    pub fn text(&self) -> &str {
        match &*self.inner {
            Inner::Parsed {
                tree, start, end, ..
            } => tree.text().get(*start..*end).unwrap_or_default(),
            Inner::Synthesized { snippet, .. } => snippet,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(&*self.inner, Inner::Synthesized { .. })
    }

    /// The tree holding the node, parsing a synthesized snippet on first use.
    pub fn source_tree(&self) -> Option<Rc<SourceTree>> {
        self.located().map(|(tree, _, _)| tree)
    }

    /// Run `f` on the located node. `None` when the node cannot be found.
    pub fn with_node<R>(&self, f: impl FnOnce(Node<'_>, &SourceTree) -> R) -> Option<R> {
        let (tree, start, end) = self.located()?;
        let node = locate(tree.root(), start, end, self.kind())?;
        Some(f(node, &tree))
    }

    fn located(&self) -> Option<(Rc<SourceTree>, usize, usize)> {
        match &*self.inner {
            Inner::Parsed {
                tree, start, end, ..
            } => Some((Rc::clone(tree), *start, *end)),
            Inner::Synthesized {
                snippet,
                kind,
                document,
            } => {
                let (tree, offset) = document
                    .get_or_init(|| parse_snippet(snippet, kind))
                    .as_ref()?;
                Some((Rc::clone(tree), *offset, offset + snippet.len()))
            }
        }
    }
}

fn parse_snippet(snippet: &str, kind: &str) -> Option<(Rc<SourceTree>, usize)> {
    let (prefix, suffix) = match kind {
        "attribute" => ("[".to_string(), format!("]\nclass {HOST_TYPE} {{ }}\n")),
        "property_declaration" | "method_declaration" => {
            (format!("class {HOST_TYPE} {{\n"), "\n}\n".to_string())
        }
        _ => (String::new(), "\n".to_string()),
    };
    let document = format!("{prefix}{snippet}{suffix}");
    SourceTree::parse("<synthesized>", document)
        .ok()
        .map(|tree| (Rc::new(tree), prefix.len()))
}

/// Smallest ancestor-or-self of the node spanning `start..end` that has `kind`.
fn locate<'t>(root: Node<'t>, start: usize, end: usize, kind: &str) -> Option<Node<'t>> {
    let mut node = root.descendant_for_byte_range(start, end)?;
    loop {
        if node.kind() == kind {
            return Some(node);
        }
        node = node.parent()?;
    }
}

impl fmt::Debug for SyntaxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxHandle")
            .field("kind", &self.kind())
            .field("synthesized", &self.is_synthesized())
            .field("text", &self.text())
            .finish()
    }
}
