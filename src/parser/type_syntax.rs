//! Type syntax to unresolved type references.

use std::fmt;
use tree_sitter::Node;

use super::language::SourceTree;
use crate::error::{ModelError, Result};
use crate::model::{ArraySpecification, PredefinedType};

/// A type as written, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeReference {
    /// A (possibly qualified) name with its type arguments.
    Named {
        name: String,
        generic_arguments: Vec<TypeReference>,
        array: Option<ArraySpecification>,
    },
    /// A builtin keyword such as `int` or `string`.
    Predefined {
        ty: PredefinedType,
        array: Option<ArraySpecification>,
    },
}

impl TypeReference {
    pub fn named(name: impl Into<String>) -> Self {
        TypeReference::Named {
            name: name.into(),
            generic_arguments: Vec::new(),
            array: None,
        }
    }

    pub fn predefined(ty: PredefinedType) -> Self {
        TypeReference::Predefined { ty, array: None }
    }

    /// Parse a standalone type such as `Dictionary<string, List<int>>[]`.
    pub fn parse(text: &str) -> Result<Self> {
        let document = format!("class __Reference {{ {text} __value; }}");
        let tree = SourceTree::parse("<reference>", document)?;
        let declaration = find_kind(tree.root(), "variable_declaration")
            .ok_or_else(|| ModelError::malformed(format!("`{text}` is not a type")))?;
        let node = declaration
            .child_by_field_name("type")
            .ok_or_else(|| ModelError::malformed(format!("`{text}` is not a type")))?;
        if tree.has_errors() {
            return Err(ModelError::malformed(format!("`{text}` is not a type")));
        }
        type_reference(node, &tree)
    }

    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<TypeReference>) -> Self {
        if let TypeReference::Named {
            generic_arguments, ..
        } = &mut self
        {
            *generic_arguments = arguments;
        }
        self
    }

    #[must_use]
    pub fn with_array(mut self, spec: Option<ArraySpecification>) -> Self {
        match &mut self {
            TypeReference::Named { array, .. } | TypeReference::Predefined { array, .. } => *array = spec,
        }
        self
    }

    /// Add the rank of an array wrapper written after the current ranks.
    fn push_rank(self, rank: u32) -> Self {
        let spec = ArraySpecification::push_rank(self.array().cloned(), rank);
        self.with_array(Some(spec))
    }

    pub fn array(&self) -> Option<&ArraySpecification> {
        match self {
            TypeReference::Named { array, .. } | TypeReference::Predefined { array, .. } => array.as_ref(),
        }
    }

    pub fn generic_arguments(&self) -> &[TypeReference] {
        match self {
            TypeReference::Named {
                generic_arguments, ..
            } => generic_arguments,
            TypeReference::Predefined { .. } => &[],
        }
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeReference::Named {
                name,
                generic_arguments,
                ..
            } => {
                write!(f, "{name}")?;
                if !generic_arguments.is_empty() {
                    let arguments: Vec<String> = generic_arguments.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", arguments.join(", "))?;
                }
            }
            TypeReference::Predefined { ty, .. } => write!(f, "{ty}")?,
        }
        if let Some(spec) = self.array() {
            for rank in &spec.ranks {
                write!(f, "[{}]", ",".repeat(rank.saturating_sub(1) as usize))?;
            }
        }
        Ok(())
    }
}

fn find_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(|child| find_kind(child, kind))
}

/// Drop whitespace and a leading `global::` from written name text.
pub(crate) fn clean_name(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.strip_prefix("global::") {
        Some(rest) => rest.to_string(),
        None => compact,
    }
}

/// Convert a type node into a reference.
pub fn type_reference(node: Node<'_>, source: &SourceTree) -> Result<TypeReference> {
    let text = source.node_text(node);
    match node.kind() {
        "predefined_type" => PredefinedType::from_keyword(text.trim())
            .map(TypeReference::predefined)
            .ok_or_else(|| ModelError::malformed(format!("unknown builtin type `{text}`"))),
        "identifier" => Ok(TypeReference::named(text.trim())),
        "generic_name" => generic_name(node, source, None),
        "qualified_name" => {
            let qualifier = node
                .child_by_field_name("qualifier")
                .map(|q| clean_name(source.node_text(q)))
                .unwrap_or_default();
            let name = node
                .child_by_field_name("name")
                .ok_or_else(|| ModelError::malformed(format!("qualified name without a name: `{text}`")))?;
            qualified(name, source, qualifier)
        }
        "alias_qualified_name" => {
            let alias = node
                .child_by_field_name("alias")
                .map(|a| source.node_text(a).trim().to_string())
                .unwrap_or_default();
            let name = node
                .child_by_field_name("name")
                .ok_or_else(|| ModelError::malformed(format!("alias-qualified name without a name: `{text}`")))?;
            let qualifier = if alias == "global" { String::new() } else { alias };
            qualified(name, source, qualifier)
        }
        "array_type" => {
            let element = node
                .child_by_field_name("type")
                .ok_or_else(|| ModelError::malformed(format!("array without element type: `{text}`")))?;
            let rank = node.child_by_field_name("rank").map(array_rank).unwrap_or(1);
            Ok(type_reference(element, source)?.push_rank(rank))
        }
        "nullable_type" | "ref_type" | "scoped_type" => {
            let inner = node
                .child_by_field_name("type")
                .ok_or_else(|| ModelError::malformed(format!("wrapper without type: `{text}`")))?;
            type_reference(inner, source)
        }
        "tuple_type" => {
            let mut cursor = node.walk();
            let elements = node
                .named_children(&mut cursor)
                .filter(|child| child.kind() == "tuple_element")
                .filter_map(|element| element.child_by_field_name("type"))
                .map(|ty| type_reference(ty, source))
                .collect::<Result<Vec<_>>>()?;
            Ok(TypeReference::named("System.ValueTuple").with_generic_arguments(elements))
        }
        other => Err(ModelError::malformed(format!(
            "unsupported type syntax `{other}` in {}: `{text}`",
            source.path()
        ))),
    }
}

fn qualified(name: Node<'_>, source: &SourceTree, qualifier: String) -> Result<TypeReference> {
    let prefix = if qualifier.is_empty() { None } else { Some(qualifier) };
    match name.kind() {
        "generic_name" => generic_name(name, source, prefix),
        _ => {
            let simple = source.node_text(name).trim();
            Ok(TypeReference::named(match prefix {
                Some(prefix) => format!("{prefix}.{simple}"),
                None => simple.to_string(),
            }))
        }
    }
}

fn generic_name(node: Node<'_>, source: &SourceTree, qualifier: Option<String>) -> Result<TypeReference> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    let identifier = children
        .iter()
        .find(|c| c.kind() == "identifier")
        .map(|c| source.node_text(*c).trim())
        .ok_or_else(|| ModelError::malformed(format!("generic name without identifier: `{}`", source.node_text(node))))?;
    let mut arguments = Vec::new();
    if let Some(list) = children.iter().find(|c| c.kind() == "type_argument_list") {
        let mut list_cursor = list.walk();
        for argument in list.named_children(&mut list_cursor) {
            arguments.push(type_reference(argument, source)?);
        }
    }
    let name = match qualifier {
        Some(qualifier) => format!("{qualifier}.{identifier}"),
        None => identifier.to_string(),
    };
    Ok(TypeReference::named(name).with_generic_arguments(arguments))
}

/// `[]` is 1, `[,]` is 2.
fn array_rank(specifier: Node<'_>) -> u32 {
    let mut cursor = specifier.walk();
    let commas = specifier.children(&mut cursor).filter(|c| c.kind() == ",").count();
    commas as u32 + 1
}
