//! Provenance-agnostic construction of declaration nodes.
//!
//! Every node leaves the factory unloaded. Its [`Provenance`] decides which
//! loader populates it later, so callers never pick a loader themselves.

use std::rc::Rc;
use tracing::debug;
use tree_sitter::Node;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::metadata::{
    split_generic_arity, type_attributes, MetadataReader, RuntimeType, TypeDefinitionHandle, TypeOrMethodDef,
};
use crate::model::{Declaration, DeclarationHeader, DeclarationKind, MetadataSource, Provenance, SyntaxHandle};
use crate::parser::type_syntax::clean_name;
use crate::parser::SyntaxDeclaration;

/// Builds unloaded declarations from syntax nodes, runtime types or metadata rows.
#[derive(Debug, Clone)]
pub struct DeclarationFactory {
    implicit_usings: Vec<String>,
}

impl Default for DeclarationFactory {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

impl DeclarationFactory {
    /// `implicit_usings` are appended to the directives of every syntax declaration.
    pub fn new(implicit_usings: Vec<String>) -> Self {
        Self { implicit_usings }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.implicit_usings.clone())
    }

    // ─── From syntax ────────────────────────────────────────────

    pub fn create_interface_declaration(
        &self,
        namespace: &str,
        using_directives: Vec<String>,
        syntax: SyntaxHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_syntax(DeclarationKind::Interface, namespace, using_directives, syntax, location)
    }

    pub fn create_class_declaration(
        &self,
        namespace: &str,
        using_directives: Vec<String>,
        syntax: SyntaxHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_syntax(DeclarationKind::Class, namespace, using_directives, syntax, location)
    }

    pub fn create_struct_declaration(
        &self,
        namespace: &str,
        using_directives: Vec<String>,
        syntax: SyntaxHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_syntax(DeclarationKind::Struct, namespace, using_directives, syntax, location)
    }

    /// Enums only come from source.
    pub fn create_enum_declaration(
        &self,
        namespace: &str,
        using_directives: Vec<String>,
        syntax: SyntaxHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_syntax(DeclarationKind::Enum, namespace, using_directives, syntax, location)
    }

    /// Dispatch on the kind the parser found.
    pub fn create_from_syntax(&self, declaration: &SyntaxDeclaration) -> Result<Declaration> {
        self.from_syntax(
            declaration.kind,
            &declaration.namespace,
            declaration.using_directives.clone(),
            declaration.syntax.clone(),
            &declaration.location,
        )
    }

    fn from_syntax(
        &self,
        kind: DeclarationKind,
        namespace: &str,
        mut using_directives: Vec<String>,
        syntax: SyntaxHandle,
        location: &str,
    ) -> Result<Declaration> {
        let (name, generic_arity) = syntax
            .with_node(|node, tree| -> Result<(String, usize)> {
                if !node_matches(node, kind) {
                    return Err(ModelError::malformed(format!(
                        "`{}` in {location} is not a {kind} declaration",
                        node.kind()
                    )));
                }
                let name = node
                    .child_by_field_name("name")
                    .map(|n| clean_name(tree.node_text(n)))
                    .ok_or_else(|| ModelError::malformed(format!("{kind} declaration without a name in {location}")))?;
                Ok((name, type_parameter_count(node)))
            })
            .ok_or_else(|| ModelError::malformed(format!("syntax node of a {kind} in {location} cannot be located")))??;

        for implicit in &self.implicit_usings {
            if !using_directives.contains(implicit) {
                using_directives.push(implicit.clone());
            }
        }

        let header = DeclarationHeader {
            kind,
            namespace: namespace.to_string(),
            name,
            generic_arity,
            using_directives,
            location: location.to_string(),
        };
        debug!(kind = %kind, name = %header.name, location, "created syntax declaration");
        Ok(Declaration::new(header, syntax, Provenance::Syntax))
    }

    // ─── From runtime types ─────────────────────────────────────

    pub fn create_interface_declaration_from_type(&self, ty: &RuntimeType) -> Result<Declaration> {
        self.from_type(Some(DeclarationKind::Interface), ty)
    }

    pub fn create_class_declaration_from_type(&self, ty: &RuntimeType) -> Result<Declaration> {
        self.from_type(Some(DeclarationKind::Class), ty)
    }

    pub fn create_struct_declaration_from_type(&self, ty: &RuntimeType) -> Result<Declaration> {
        self.from_type(Some(DeclarationKind::Struct), ty)
    }

    /// Detect the kind from the definition row.
    pub fn create_from_type(&self, ty: &RuntimeType) -> Result<Declaration> {
        self.from_type(None, ty)
    }

    fn from_type(&self, kind: Option<DeclarationKind>, ty: &RuntimeType) -> Result<Declaration> {
        let handle = ty.definition().ok_or_else(|| {
            ModelError::not_found(format!(
                "no type definition for `{}` in {}",
                ty.full_name(),
                ty.module().location()
            ))
        })?;
        self.from_metadata(kind, ty.module().reader(), handle, ty.module().location())
    }

    // ─── From metadata ──────────────────────────────────────────

    pub fn create_interface_declaration_from_metadata(
        &self,
        reader: &Rc<MetadataReader>,
        handle: TypeDefinitionHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_metadata(Some(DeclarationKind::Interface), reader, handle, location)
    }

    pub fn create_class_declaration_from_metadata(
        &self,
        reader: &Rc<MetadataReader>,
        handle: TypeDefinitionHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_metadata(Some(DeclarationKind::Class), reader, handle, location)
    }

    pub fn create_struct_declaration_from_metadata(
        &self,
        reader: &Rc<MetadataReader>,
        handle: TypeDefinitionHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_metadata(Some(DeclarationKind::Struct), reader, handle, location)
    }

    /// Detect the kind from the definition row.
    pub fn create_from_metadata(
        &self,
        reader: &Rc<MetadataReader>,
        handle: TypeDefinitionHandle,
        location: &str,
    ) -> Result<Declaration> {
        self.from_metadata(None, reader, handle, location)
    }

    fn from_metadata(
        &self,
        expected: Option<DeclarationKind>,
        reader: &Rc<MetadataReader>,
        handle: TypeDefinitionHandle,
        location: &str,
    ) -> Result<Declaration> {
        let kind = metadata_kind(reader, handle)?;
        if let Some(expected) = expected {
            if expected != kind {
                return Err(ModelError::malformed(format!(
                    "{handle} in {location} is a {kind}, not a {expected}"
                )));
            }
        }

        let (namespace, raw_name) = reader.type_definition_name(handle)?;
        let (name, _) = split_generic_arity(raw_name);
        let generic_names = reader
            .generic_parameters_of(TypeOrMethodDef::TypeDef(handle))
            .into_iter()
            .map(|gp| reader.string(reader.generic_parameter(gp)?.name).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut snippet = format!("public {kind} {name}");
        if !generic_names.is_empty() {
            snippet.push_str(&format!("<{}>", generic_names.join(", ")));
        }
        snippet.push_str(" { }");

        let header = DeclarationHeader {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            generic_arity: generic_names.len(),
            using_directives: Vec::new(),
            location: location.to_string(),
        };
        debug!(kind = %kind, name = %header.name, location, %handle, "created metadata declaration");
        let provenance = Provenance::Metadata(MetadataSource {
            reader: Rc::clone(reader),
            handle,
        });
        Ok(Declaration::new(
            header,
            SyntaxHandle::synthesized(snippet, declaration_node_kind(kind)),
            provenance,
        ))
    }
}

/// Kind of a metadata type: interface flag, then the base type.
pub(crate) fn metadata_kind(reader: &MetadataReader, handle: TypeDefinitionHandle) -> Result<DeclarationKind> {
    let row = reader.type_definition(handle)?;
    if row.flags & type_attributes::INTERFACE != 0 {
        return Ok(DeclarationKind::Interface);
    }
    let Some(base) = row.extends else {
        return Ok(DeclarationKind::Class);
    };
    Ok(match reader.type_name(base)? {
        Some(("System", "ValueType")) => DeclarationKind::Struct,
        Some(("System", "Enum")) => DeclarationKind::Enum,
        _ => DeclarationKind::Class,
    })
}

fn declaration_node_kind(kind: DeclarationKind) -> &'static str {
    match kind {
        DeclarationKind::Interface => "interface_declaration",
        DeclarationKind::Class => "class_declaration",
        DeclarationKind::Struct => "struct_declaration",
        DeclarationKind::Enum => "enum_declaration",
    }
}

fn node_matches(node: Node<'_>, kind: DeclarationKind) -> bool {
    match node.kind() {
        "record_declaration" => {
            let mut cursor = node.walk();
            let is_struct = node.children(&mut cursor).any(|c| c.kind() == "struct");
            kind == if is_struct { DeclarationKind::Struct } else { DeclarationKind::Class }
        }
        other => other == declaration_node_kind(kind),
    }
}

fn type_parameter_count(node: Node<'_>) -> usize {
    let mut cursor = node.walk();
    let Some(list) = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "type_parameter_list")
    else {
        return 0;
    };
    let mut list_cursor = list.walk();
    let count = list
        .named_children(&mut list_cursor)
        .filter(|c| c.kind() == "type_parameter")
        .count();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{LoadedModule, ModuleBuilder};
    use crate::parser::SourceUnit;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::parse("Shapes.cs", text).unwrap()
    }

    #[test]
    fn test_create_from_syntax_reads_name_and_arity() {
        let unit = unit("namespace Sample { public class Pair<TFirst, TSecond> { } }");
        let factory = DeclarationFactory::default();
        let decl = factory.create_from_syntax(&unit.declarations()[0]).unwrap();
        assert_eq!(decl.full_name(), "Sample.Pair");
        assert_eq!(decl.generic_arity(), 2);
        assert_eq!(decl.kind(), DeclarationKind::Class);
        assert!(!decl.is_loaded());
        assert_eq!(decl.using_directives(), &["System".to_string()]);
    }

    #[test]
    fn test_implicit_usings_are_not_duplicated() {
        let unit = unit("using System;\nnamespace Sample { interface IShape { } }");
        let factory = DeclarationFactory::new(vec!["System".to_string(), "System.Linq".to_string()]);
        let decl = factory.create_from_syntax(&unit.declarations()[0]).unwrap();
        assert_eq!(
            decl.using_directives(),
            &["System".to_string(), "System.Linq".to_string()]
        );
    }

    #[test]
    fn test_syntax_kind_mismatch_is_malformed() {
        let unit = unit("struct Point { }");
        let decl = &unit.declarations()[0];
        let err = DeclarationFactory::default()
            .create_class_declaration("", Vec::new(), decl.syntax.clone(), "Shapes.cs")
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput(_)), "got {err:?}");
    }

    #[test]
    fn test_metadata_kind_detection() {
        let mut builder = ModuleBuilder::new("Sample");
        let object = builder.external_type("System.Runtime", "System", "Object");
        let value_type = builder.external_type("System.Runtime", "System", "ValueType");
        let enum_base = builder.external_type("System.Runtime", "System", "Enum");
        let shape = builder.define_type(
            type_attributes::PUBLIC | type_attributes::INTERFACE | type_attributes::ABSTRACT,
            "Sample",
            "IShape",
            None,
        );
        let point = builder.define_type(type_attributes::PUBLIC, "Sample", "Point", Some(value_type));
        let color = builder.define_type(type_attributes::PUBLIC, "Sample", "Color", Some(enum_base));
        let pair = builder.define_type(type_attributes::PUBLIC, "Sample", "Pair`2", Some(object));
        builder.add_generic_parameter(TypeOrMethodDef::TypeDef(pair), "TFirst");
        builder.add_generic_parameter(TypeOrMethodDef::TypeDef(pair), "TSecond");
        let reader = Rc::new(builder.finish());

        assert_eq!(metadata_kind(&reader, shape).unwrap(), DeclarationKind::Interface);
        assert_eq!(metadata_kind(&reader, point).unwrap(), DeclarationKind::Struct);
        assert_eq!(metadata_kind(&reader, color).unwrap(), DeclarationKind::Enum);

        let factory = DeclarationFactory::default();
        let decl = factory
            .create_class_declaration_from_metadata(&reader, pair, "lib/Sample.dll")
            .unwrap();
        assert_eq!(decl.name(), "Pair", "arity marker is stripped");
        assert_eq!(decl.namespace(), "Sample");
        assert_eq!(decl.generic_arity(), 2);
        assert!(decl.using_directives().is_empty());
        assert_eq!(decl.syntax().text(), "public class Pair<TFirst, TSecond> { }");
    }

    #[test]
    fn test_metadata_absent_handle_is_malformed() {
        let reader = Rc::new(ModuleBuilder::new("Sample").finish());
        let err = DeclarationFactory::default()
            .create_class_declaration_from_metadata(&reader, TypeDefinitionHandle::from_row(9), "lib/Sample.dll")
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput(_)), "got {err:?}");
    }

    #[test]
    fn test_metadata_kind_mismatch_is_malformed() {
        let mut builder = ModuleBuilder::new("Sample");
        let shape = builder.define_type(type_attributes::INTERFACE, "Sample", "IShape", None);
        let reader = Rc::new(builder.finish());
        let err = DeclarationFactory::default()
            .create_struct_declaration_from_metadata(&reader, shape, "lib/Sample.dll")
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput(_)));
    }

    #[test]
    fn test_runtime_type_without_definition_is_not_found() {
        let module = LoadedModule::new(ModuleBuilder::new("Sample").finish(), "lib/Sample.dll");
        let err = DeclarationFactory::default()
            .create_class_declaration_from_type(&module.runtime_type("Sample.Missing"))
            .unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)), "got {err:?}");
    }

    #[test]
    fn test_runtime_type_resolves_its_module() {
        let mut builder = ModuleBuilder::new("Sample");
        builder.define_type(type_attributes::PUBLIC | type_attributes::INTERFACE, "Sample", "IShape", None);
        let module = LoadedModule::new(builder.finish(), "lib/Sample.dll");
        let decl = DeclarationFactory::default()
            .create_interface_declaration_from_type(&module.runtime_type("Sample.IShape"))
            .unwrap();
        assert_eq!(decl.full_name(), "Sample.IShape");
        assert_eq!(decl.location(), "lib/Sample.dll");
        assert!(matches!(decl.provenance(), Provenance::Metadata(_)));
    }
}
