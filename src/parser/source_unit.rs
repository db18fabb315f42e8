//! Declarations of one compilation unit, with their namespace and usings.

use std::rc::Rc;
use tree_sitter::Node;

use super::language::SourceTree;
use super::type_syntax::clean_name;
use crate::error::Result;
use crate::model::{DeclarationKind, SyntaxHandle};

/// A type declaration found in source, ready for the factory.
#[derive(Debug, Clone)]
pub struct SyntaxDeclaration {
    pub kind: DeclarationKind,
    pub namespace: String,
    /// Innermost namespace usings first, file-level usings last.
    pub using_directives: Vec<String>,
    pub syntax: SyntaxHandle,
    pub location: String,
}

/// A parsed file and the declarations it contains.
#[derive(Debug)]
pub struct SourceUnit {
    tree: Rc<SourceTree>,
    declarations: Vec<SyntaxDeclaration>,
}

impl SourceUnit {
    pub fn parse(path: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Ok(Self::from_tree(SourceTree::parse(path, text)?))
    }

    pub fn from_tree(tree: SourceTree) -> Self {
        let tree = Rc::new(tree);
        let mut declarations = Vec::new();
        collect(&tree, tree.root(), "", &[], &mut declarations);
        Self { tree, declarations }
    }

    pub fn tree(&self) -> &Rc<SourceTree> {
        &self.tree
    }

    pub fn path(&self) -> &str {
        self.tree.path()
    }

    pub fn declarations(&self) -> &[SyntaxDeclaration] {
        &self.declarations
    }
}

fn join(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn collect(
    tree: &Rc<SourceTree>,
    container: Node<'_>,
    namespace: &str,
    outer_usings: &[String],
    out: &mut Vec<SyntaxDeclaration>,
) {
    let mut cursor = container.walk();
    let children: Vec<Node<'_>> = container.named_children(&mut cursor).collect();

    let mut usings: Vec<String> = children
        .iter()
        .filter(|c| c.kind() == "using_directive")
        .filter_map(|c| using_directive(*c, tree))
        .collect();
    usings.extend(outer_usings.iter().cloned());

    let mut namespace = namespace.to_string();
    for child in children {
        match child.kind() {
            "namespace_declaration" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                let nested = join(&namespace, &clean_name(tree.node_text(name)));
                if let Some(body) = child.child_by_field_name("body") {
                    collect(tree, body, &nested, &usings, out);
                }
            }
            "file_scoped_namespace_declaration" => {
                if let Some(name) = child.child_by_field_name("name") {
                    namespace = join(&namespace, &clean_name(tree.node_text(name)));
                }
                collect(tree, child, &namespace, &usings, out);
            }
            kind => {
                if let Some(kind) = declaration_kind(child, kind) {
                    out.push(SyntaxDeclaration {
                        kind,
                        namespace: namespace.clone(),
                        using_directives: usings.clone(),
                        syntax: SyntaxHandle::parsed(tree, child),
                        location: tree.path().to_string(),
                    });
                }
            }
        }
    }
}

fn declaration_kind(node: Node<'_>, kind: &str) -> Option<DeclarationKind> {
    match kind {
        "class_declaration" => Some(DeclarationKind::Class),
        "interface_declaration" => Some(DeclarationKind::Interface),
        "struct_declaration" | "record_struct_declaration" => Some(DeclarationKind::Struct),
        "enum_declaration" => Some(DeclarationKind::Enum),
        "record_declaration" => {
            let mut cursor = node.walk();
            let is_struct = node.children(&mut cursor).any(|c| c.kind() == "struct");
            Some(if is_struct {
                DeclarationKind::Struct
            } else {
                DeclarationKind::Class
            })
        }
        _ => None,
    }
}

/// `System.Linq`, or `Alias = Target` for alias directives. Static usings are skipped.
fn using_directive(node: Node<'_>, tree: &SourceTree) -> Option<String> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    if children.iter().any(|c| c.kind() == "static") {
        return None;
    }
    let alias = node.child_by_field_name("name");
    let target = children
        .iter()
        .filter(|c| c.is_named() && Some(c.id()) != alias.map(|a| a.id()))
        .last()?;
    let target = clean_name(tree.node_text(*target));
    match alias {
        Some(alias) => Some(format!("{} = {target}", tree.node_text(alias).trim())),
        None => Some(target),
    }
}
