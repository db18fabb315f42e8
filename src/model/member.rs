//! Members, generic parameters and attributes owned by a declaration.

use super::syntax_handle::SyntaxHandle;
use super::use_site::DeclarationUse;
use crate::graph::DeclarationGraph;

/// A generic parameter with its type constraints, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    pub name: String,
    pub constraints: Vec<DeclarationUse>,
}

impl GenericParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }
}

/// An applied custom attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Name of the attribute declaration, e.g. `PatternAttribute`.
    pub name: String,
    pub declaration: DeclarationUse,
    /// The attribute as written, for literal re-emission.
    pub syntax: SyntaxHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub parameter_type: DeclarationUse,
}

#[derive(Debug, Clone)]
pub struct PropertyDeclaration {
    pub name: String,
    pub property_type: DeclarationUse,
    pub has_getter: bool,
    pub has_setter: bool,
    pub attributes: Vec<Attribute>,
    pub syntax: SyntaxHandle,
}

#[derive(Debug, Clone)]
pub struct MethodDeclaration {
    pub name: String,
    pub return_type: DeclarationUse,
    pub parameters: Vec<Parameter>,
    pub generic_parameters: Vec<GenericParameter>,
    pub attributes: Vec<Attribute>,
    pub syntax: SyntaxHandle,
}

#[derive(Debug, Clone)]
pub enum Member {
    Property(PropertyDeclaration),
    Method(MethodDeclaration),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Property(p) => &p.name,
            Member::Method(m) => &m.name,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match self {
            Member::Property(p) => &p.attributes,
            Member::Method(m) => &m.attributes,
        }
    }

    pub fn syntax(&self) -> &SyntaxHandle {
        match self {
            Member::Property(p) => &p.syntax,
            Member::Method(m) => &m.syntax,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyDeclaration> {
        match self {
            Member::Property(p) => Some(p),
            Member::Method(_) => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDeclaration> {
        match self {
            Member::Method(m) => Some(m),
            Member::Property(_) => None,
        }
    }

    /// `property` or `method`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Member::Property(_) => "property",
            Member::Method(_) => "method",
        }
    }

    /// C# signature without modifiers or body.
    pub fn signature(&self, graph: &DeclarationGraph) -> String {
        match self {
            Member::Property(p) => property_signature(graph, &p.name, &p.property_type, p.has_getter, p.has_setter),
            Member::Method(m) => {
                let generics: Vec<&str> = m.generic_parameters.iter().map(|g| g.name.as_str()).collect();
                let parameters: Vec<(&str, String)> = m
                    .parameters
                    .iter()
                    .map(|p| (p.name.as_str(), p.parameter_type.display(graph)))
                    .collect();
                method_signature(&m.return_type.display(graph), &m.name, &generics, &parameters)
            }
        }
    }
}

pub(crate) fn property_signature(
    graph: &DeclarationGraph,
    name: &str,
    property_type: &DeclarationUse,
    has_getter: bool,
    has_setter: bool,
) -> String {
    let mut accessors = String::new();
    if has_getter {
        accessors.push_str("get; ");
    }
    if has_setter {
        accessors.push_str("set; ");
    }
    format!("{} {} {{ {}}}", property_type.display(graph), name, accessors)
}

pub(crate) fn method_signature(
    return_type: &str,
    name: &str,
    generics: &[&str],
    parameters: &[(&str, String)],
) -> String {
    let mut out = format!("{return_type} {name}");
    if !generics.is_empty() {
        out.push('<');
        out.push_str(&generics.join(", "));
        out.push('>');
    }
    out.push('(');
    let rendered: Vec<String> = parameters
        .iter()
        .map(|(name, ty)| format!("{ty} {name}"))
        .collect();
    out.push_str(&rendered.join(", "));
    out.push(')');
    out
}
