//! Edge kinds and the serializable views handed to consumers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{DeclId, DeclarationKind};

/// How one declaration refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Base class or implemented interface.
    Extends,
    /// Type of a property.
    PropertyType,
    /// Return type of a method.
    ReturnType,
    /// Type of a method parameter.
    Parameter,
    /// Argument of an instantiated generic type anywhere in a use-site.
    GenericArgument,
    /// Type constraint on a generic parameter.
    Constraint,
    /// Applied attribute, on the type or one of its members.
    Attribute,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Extends => write!(f, "extends"),
            EdgeKind::PropertyType => write!(f, "property_type"),
            EdgeKind::ReturnType => write!(f, "return_type"),
            EdgeKind::Parameter => write!(f, "parameter"),
            EdgeKind::GenericArgument => write!(f, "generic_argument"),
            EdgeKind::Constraint => write!(f, "constraint"),
            EdgeKind::Attribute => write!(f, "attribute"),
        }
    }
}

/// Data stored on a graph edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    pub kind: EdgeKind,
}

impl EdgeData {
    pub fn new(kind: EdgeKind) -> Self {
        Self { kind }
    }
}

/// A search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(skip)]
    pub id: DeclId,
    pub full_name: String,
    pub kind: DeclarationKind,
    pub generic_arity: usize,
    pub location: String,
}

/// One neighbour of a declaration and how they are related.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyInfo {
    #[serde(skip)]
    pub id: DeclId,
    pub full_name: String,
    pub kind: DeclarationKind,
    pub location: String,
    pub relationship: EdgeKind,
}

/// Statistics about the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_declarations: usize,
    pub loaded_declarations: usize,
    pub total_edges: usize,
    pub classes: usize,
    pub interfaces: usize,
    pub structs: usize,
    pub enums: usize,
    pub from_syntax: usize,
    pub from_metadata: usize,
    pub locations: usize,
}

/// A loaded declaration's shape rendered as C#.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationSummary {
    pub kind: DeclarationKind,
    pub full_name: String,
    pub location: String,
    /// `syntax` or `metadata`.
    pub provenance: String,
    pub loaded: bool,
    /// `T` or `T : IComparable<T>`.
    pub generic_parameters: Vec<String>,
    pub extends: Vec<String>,
    pub members: Vec<MemberSummary>,
    /// Attribute syntax as written or synthesized.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub kind: String,
    pub name: String,
    pub signature: String,
    pub attributes: Vec<String>,
}
