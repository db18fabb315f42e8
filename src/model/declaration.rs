//! The declaration node.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::member::{Attribute, GenericParameter, MethodDeclaration, Member, PropertyDeclaration};
use super::side_data::SideData;
use super::syntax_handle::SyntaxHandle;
use super::use_site::DeclarationUse;
use crate::error::{ModelError, Result};
use crate::graph::EdgeKind;
use crate::metadata::{MetadataReader, TypeDefinitionHandle};

/// Stable index of a declaration in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) NodeIndex);

impl DeclId {
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Interface,
    Class,
    Struct,
    Enum,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Interface => write!(f, "interface"),
            DeclarationKind::Class => write!(f, "class"),
            DeclarationKind::Struct => write!(f, "struct"),
            DeclarationKind::Enum => write!(f, "enum"),
        }
    }
}

/// Where a declaration's shape comes from.
#[derive(Debug, Clone)]
pub enum Provenance {
    /// Parsed source; the loader walks the declaration's own syntax handle.
    Syntax,
    /// A type definition row of a metadata module.
    Metadata(MetadataSource),
}

#[derive(Clone)]
pub struct MetadataSource {
    pub reader: Rc<MetadataReader>,
    pub handle: TypeDefinitionHandle,
}

impl fmt::Debug for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataSource")
            .field("assembly", &self.reader.assembly_name())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Identity of a new declaration, fixed at creation.
#[derive(Debug, Clone)]
pub(crate) struct DeclarationHeader {
    pub kind: DeclarationKind,
    pub namespace: String,
    pub name: String,
    pub generic_arity: usize,
    pub using_directives: Vec<String>,
    pub location: String,
}

/// `namespace.name`, or `name` alone in the global namespace.
pub fn full_name_of(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// A class, interface, struct or enum in the graph.
///
/// Created unloaded by the factory. Loading publishes generic parameters,
/// base types, members and attributes exactly once; afterwards only the
/// side-data slot changes.
#[derive(Debug)]
pub struct Declaration {
    kind: DeclarationKind,
    namespace: String,
    name: String,
    full_name: String,
    location: String,
    generic_arity: usize,
    using_directives: Vec<String>,
    syntax: SyntaxHandle,
    provenance: Provenance,
    data: SideData,
    pub(crate) loaded: bool,
    pub(crate) generic_parameters: Vec<GenericParameter>,
    pub(crate) extends: Vec<DeclarationUse>,
    pub(crate) members: Vec<Member>,
    pub(crate) attributes: Vec<Attribute>,
}

impl Declaration {
    pub(crate) fn new(header: DeclarationHeader, syntax: SyntaxHandle, provenance: Provenance) -> Self {
        let full_name = full_name_of(&header.namespace, &header.name);
        Self {
            kind: header.kind,
            namespace: header.namespace,
            name: header.name,
            full_name,
            location: header.location,
            generic_arity: header.generic_arity,
            using_directives: header.using_directives,
            syntax,
            provenance,
            data: SideData::default(),
            loaded: false,
            generic_parameters: Vec::new(),
            extends: Vec::new(),
            members: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Number of generic parameters, known before loading.
    pub fn generic_arity(&self) -> usize {
        self.generic_arity
    }

    pub fn using_directives(&self) -> &[String] {
        &self.using_directives
    }

    pub fn syntax(&self) -> &SyntaxHandle {
        &self.syntax
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn generic_parameters(&self) -> &[GenericParameter] {
        &self.generic_parameters
    }

    /// Base class and implemented interfaces, in source or table order.
    pub fn extends(&self) -> &[DeclarationUse] {
        &self.extends
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDeclaration> {
        self.members.iter().filter_map(Member::as_property)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDeclaration> {
        self.members.iter().filter_map(Member::as_method)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Payload of kind `T`, if one was stored.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.get::<T>()
    }

    /// Store a payload of kind `T`. Fails when the kind is already present.
    pub fn set_data<T: Any>(&mut self, value: T) -> Result<()> {
        self.data
            .insert(value)
            .map_err(|kind| ModelError::DataIntegrity {
                kind,
                declaration: self.full_name.clone(),
            })
    }

    /// Every graph node this declaration refers to, tagged with the relationship.
    pub fn references(&self) -> Vec<(EdgeKind, DeclId)> {
        let mut out = Vec::new();
        let mut push = |kind: EdgeKind, use_site: &DeclarationUse| {
            let mut ids = use_site.referenced_declarations().into_iter();
            if let Some(first) = ids.next() {
                out.push((kind, first));
            }
            out.extend(ids.map(|id| (EdgeKind::GenericArgument, id)));
        };

        for parameter in &self.generic_parameters {
            for constraint in &parameter.constraints {
                push(EdgeKind::Constraint, constraint);
            }
        }
        for base in &self.extends {
            push(EdgeKind::Extends, base);
        }
        for member in &self.members {
            match member {
                Member::Property(p) => push(EdgeKind::PropertyType, &p.property_type),
                Member::Method(m) => {
                    push(EdgeKind::ReturnType, &m.return_type);
                    for parameter in &m.parameters {
                        push(EdgeKind::Parameter, &parameter.parameter_type);
                    }
                    for generic in &m.generic_parameters {
                        for constraint in &generic.constraints {
                            push(EdgeKind::Constraint, constraint);
                        }
                    }
                }
            }
            for attribute in member.attributes() {
                push(EdgeKind::Attribute, &attribute.declaration);
            }
        }
        for attribute in &self.attributes {
            push(EdgeKind::Attribute, &attribute.declaration);
        }
        out
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.full_name)?;
        if self.generic_arity > 0 {
            write!(f, "`{}", self.generic_arity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(namespace: &str) -> Declaration {
        Declaration::new(
            DeclarationHeader {
                kind: DeclarationKind::Class,
                namespace: namespace.to_string(),
                name: "Widget".to_string(),
                generic_arity: 0,
                using_directives: vec!["System".to_string()],
                location: "Widget.cs".to_string(),
            },
            SyntaxHandle::synthesized("public class Widget { }", "class_declaration"),
            Provenance::Syntax,
        )
    }

    #[test]
    fn test_full_name() {
        assert_eq!(sample("Sample.Core").full_name(), "Sample.Core.Widget");
        assert_eq!(sample("").full_name(), "Widget");
    }

    #[test]
    fn test_new_declaration_is_unloaded_and_empty() {
        let decl = sample("Sample");
        assert!(!decl.is_loaded());
        assert!(decl.generic_parameters().is_empty());
        assert!(decl.extends().is_empty());
        assert!(decl.members().is_empty());
        assert!(decl.references().is_empty());
        assert_eq!(decl.to_string(), "class Sample.Widget");
    }

    #[test]
    fn test_set_data_twice_is_integrity_error() {
        #[derive(Debug, PartialEq)]
        struct Binding(&'static str);

        let mut decl = sample("Sample");
        assert!(decl.data::<Binding>().is_none());
        decl.set_data(Binding("T -> int")).unwrap();
        let err = decl.set_data(Binding("T -> string")).unwrap_err();
        match err {
            ModelError::DataIntegrity { declaration, .. } => assert_eq!(declaration, "Sample.Widget"),
            other => panic!("expected data integrity error, got {other:?}"),
        }
        assert_eq!(decl.data::<Binding>(), Some(&Binding("T -> int")));
    }
}
