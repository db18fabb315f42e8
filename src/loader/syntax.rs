//! Loading declarations parsed from source.
//!
//! Walks the declaration's syntax node and resolves every written type in
//! the scope of the declaration: its namespace, its using directives and the
//! generic parameters visible at that point.

use std::rc::Rc;
use tracing::{debug, trace};
use tree_sitter::Node;

use crate::error::{ModelError, Result};
use crate::model::{
    Attribute, DeclId, DeclarationKind, DeclarationUse, GenericParameter, Member, MethodDeclaration, Parameter,
    PropertyDeclaration, SyntaxHandle,
};
use crate::parser::{type_reference, SourceTree};
use crate::resolver::{DeclarationResolver, ResolveScope};

pub(crate) fn load(resolver: &mut DeclarationResolver, id: DeclId) -> Result<()> {
    let declaration = resolver.graph().get(id);
    let syntax = declaration.syntax().clone();
    let kind = declaration.kind();
    let scope = ResolveScope::of(declaration);
    let unlocated = || {
        ModelError::malformed(format!(
            "syntax of {} cannot be located in {}",
            scope.requester, scope.location
        ))
    };
    let tree = syntax.source_tree().ok_or_else(unlocated)?;
    syntax
        .with_node(|node, _| load_node(resolver, id, kind, &tree, node, scope.clone()))
        .ok_or_else(unlocated)?
}

fn load_node(
    resolver: &mut DeclarationResolver,
    id: DeclId,
    kind: DeclarationKind,
    tree: &Rc<SourceTree>,
    node: Node<'_>,
    scope: ResolveScope,
) -> Result<()> {
    if kind == DeclarationKind::Enum {
        let attributes = attributes(resolver, node, tree, &scope)?;
        resolver.graph_mut().get_mut(id).attributes = attributes;
        return Ok(());
    }

    // generic parameters, then their constraints
    let names = type_parameter_names(node, tree);
    resolver.graph_mut().get_mut(id).generic_parameters = names.iter().map(GenericParameter::new).collect();
    let scope = scope.with_type_parameters(names);
    for (name, constraint) in constraints(resolver, node, tree, &scope)? {
        let declaration = resolver.graph_mut().get_mut(id);
        if let Some(parameter) = declaration.generic_parameters.iter_mut().find(|p| p.name == name) {
            parameter.constraints.push(constraint);
        }
    }

    // base class and interfaces, in written order
    if let Some(base_list) = named_child_of_kind(node, "base_list") {
        let mut cursor = base_list.walk();
        let bases: Vec<Node<'_>> = base_list.named_children(&mut cursor).collect();
        for base in bases {
            let ty = match base.kind() {
                "argument_list" => continue,
                "primary_constructor_base_type" => match base
                    .child_by_field_name("type")
                    .or_else(|| base.named_child(0))
                {
                    Some(ty) => ty,
                    None => continue,
                },
                _ => base,
            };
            let reference = type_reference(ty, tree)?;
            let resolved = resolver.resolve(&reference, &scope)?;
            resolver.graph_mut().get_mut(id).extends.push(resolved);
        }
    }

    // members, in written order
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        let children: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
        for child in children {
            let member = match child.kind() {
                "property_declaration" => Member::Property(property(resolver, child, tree, &scope)?),
                "method_declaration" => Member::Method(method(resolver, child, tree, &scope)?),
                other => {
                    trace!(kind = other, "skipping member");
                    continue;
                }
            };
            resolver.graph_mut().get_mut(id).members.push(member);
        }
    }

    let attributes = attributes(resolver, node, tree, &scope)?;
    resolver.graph_mut().get_mut(id).attributes = attributes;
    debug!(declaration = %scope.requester, "loaded from syntax");
    Ok(())
}

fn property(
    resolver: &mut DeclarationResolver,
    node: Node<'_>,
    tree: &Rc<SourceTree>,
    scope: &ResolveScope,
) -> Result<PropertyDeclaration> {
    let name = required_field(node, "name", tree)?;
    let ty = required_node(node, "type", tree)?;
    let property_type = resolver.resolve(&type_reference(ty, tree)?, scope)?;

    let (mut has_getter, mut has_setter) = (false, false);
    match node.child_by_field_name("accessors") {
        Some(accessors) => {
            let mut cursor = accessors.walk();
            for accessor in accessors.named_children(&mut cursor) {
                if accessor.kind() != "accessor_declaration" {
                    continue;
                }
                let keyword = accessor
                    .child_by_field_name("name")
                    .map(|n| tree.node_text(n).trim())
                    .unwrap_or_default();
                match keyword {
                    "get" => has_getter = true,
                    "set" | "init" => has_setter = true,
                    _ => {}
                }
            }
        }
        // `int Count => count;`
        None => has_getter = node.child_by_field_name("value").is_some(),
    }

    Ok(PropertyDeclaration {
        name,
        property_type,
        has_getter,
        has_setter,
        attributes: attributes(resolver, node, tree, scope)?,
        syntax: SyntaxHandle::parsed(tree, node),
    })
}

fn method(
    resolver: &mut DeclarationResolver,
    node: Node<'_>,
    tree: &Rc<SourceTree>,
    scope: &ResolveScope,
) -> Result<MethodDeclaration> {
    let name = required_field(node, "name", tree)?;
    let generic_names = type_parameter_names(node, tree);
    let scope = scope.clone().with_method_parameters(generic_names.clone());

    let returns = required_node(node, "returns", tree)?;
    let return_type = resolver.resolve(&type_reference(returns, tree)?, &scope)?;

    let mut parameters = Vec::new();
    if let Some(list) = node.child_by_field_name("parameters") {
        for (name, ty) in parameter_nodes(list, tree)? {
            let parameter_type = resolver.resolve(&type_reference(ty, tree)?, &scope)?;
            parameters.push(Parameter { name, parameter_type });
        }
    }

    let mut generic_parameters: Vec<GenericParameter> = generic_names.iter().map(GenericParameter::new).collect();
    for (name, constraint) in constraints(resolver, node, tree, &scope)? {
        if let Some(parameter) = generic_parameters.iter_mut().find(|p| p.name == name) {
            parameter.constraints.push(constraint);
        }
    }

    Ok(MethodDeclaration {
        name,
        return_type,
        parameters,
        generic_parameters,
        attributes: attributes(resolver, node, tree, &scope)?,
        syntax: SyntaxHandle::parsed(tree, node),
    })
}

/// `(name, type node)` of each parameter. A `params` array's pieces sit
/// directly in the list, tagged by field name.
fn parameter_nodes<'t>(list: Node<'t>, tree: &SourceTree) -> Result<Vec<(String, Node<'t>)>> {
    let mut out = Vec::new();
    let mut pending_type: Option<Node<'t>> = None;
    let mut cursor = list.walk();
    if !cursor.goto_first_child() {
        return Ok(out);
    }
    loop {
        let child = cursor.node();
        match (child.kind(), cursor.field_name()) {
            ("parameter", _) => {
                let name = required_field(child, "name", tree)?;
                let ty = required_node(child, "type", tree)?;
                out.push((name, ty));
            }
            (_, Some("type")) => pending_type = Some(child),
            (_, Some("name")) => {
                let ty = pending_type.take().ok_or_else(|| {
                    ModelError::malformed(format!(
                        "parameter array without a type in {}: `{}`",
                        tree.path(),
                        tree.node_text(list)
                    ))
                })?;
                out.push((tree.node_text(child).trim().to_string(), ty));
            }
            _ => {}
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
    Ok(out)
}

fn type_parameter_names(node: Node<'_>, tree: &SourceTree) -> Vec<String> {
    let Some(list) = node
        .child_by_field_name("type_parameters")
        .or_else(|| named_child_of_kind(node, "type_parameter_list"))
    else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|c| c.kind() == "type_parameter")
        .filter_map(|p| {
            p.child_by_field_name("name")
                .or_else(|| named_child_of_kind(p, "identifier"))
        })
        .map(|name| tree.node_text(name).trim().to_string())
        .collect()
}

/// Type constraints from `where` clauses, as `(parameter name, constraint)`.
/// `class`, `struct`, `new()` and friends carry no type and are skipped.
fn constraints(
    resolver: &mut DeclarationResolver,
    node: Node<'_>,
    tree: &SourceTree,
    scope: &ResolveScope,
) -> Result<Vec<(String, DeclarationUse)>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    let clauses: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "type_parameter_constraints_clause")
        .collect();
    for clause in clauses {
        let Some(target) = named_child_of_kind(clause, "identifier") else {
            continue;
        };
        let parameter = tree.node_text(target).trim().to_string();
        let mut clause_cursor = clause.walk();
        let types: Vec<Node<'_>> = clause
            .named_children(&mut clause_cursor)
            .filter(|c| c.kind() == "type_parameter_constraint")
            .filter_map(|c| c.child_by_field_name("type"))
            .collect();
        for ty in types {
            let resolved = resolver.resolve(&type_reference(ty, tree)?, scope)?;
            out.push((parameter.clone(), resolved));
        }
    }
    Ok(out)
}

/// Attributes applied to `node`. Lists targeting the return value are skipped.
fn attributes(
    resolver: &mut DeclarationResolver,
    node: Node<'_>,
    tree: &Rc<SourceTree>,
    scope: &ResolveScope,
) -> Result<Vec<Attribute>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    let lists: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "attribute_list")
        .collect();
    for list in lists {
        let targets_return = named_child_of_kind(list, "attribute_target_specifier")
            .is_some_and(|t| tree.node_text(t).contains("return"));
        if targets_return {
            continue;
        }
        let mut list_cursor = list.walk();
        let applied: Vec<Node<'_>> = list
            .named_children(&mut list_cursor)
            .filter(|c| c.kind() == "attribute")
            .collect();
        for attribute in applied {
            let name = required_node(attribute, "name", tree)?;
            let declaration = resolver.resolve_attribute(&type_reference(name, tree)?, scope)?;
            out.push(Attribute {
                name: declaration.name(resolver.graph()).to_string(),
                declaration,
                syntax: SyntaxHandle::parsed(tree, attribute),
            });
        }
    }
    Ok(out)
}

fn named_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn required_node<'t>(node: Node<'t>, field: &str, tree: &SourceTree) -> Result<Node<'t>> {
    node.child_by_field_name(field).ok_or_else(|| {
        ModelError::malformed(format!(
            "{} without `{field}` in {}: `{}`",
            node.kind(),
            tree.path(),
            tree.node_text(node)
        ))
    })
}

fn required_field(node: Node<'_>, field: &str, tree: &SourceTree) -> Result<String> {
    required_node(node, field, tree).map(|n| tree.node_text(n).trim().to_string())
}

#[cfg(test)]
mod tests {
    use crate::config::ModelConfig;
    use crate::model::{DeclarationUse, GenericParameterOwner, PredefinedType};
    use crate::parser::SourceUnit;
    use crate::resolver::DeclarationResolver;

    fn load(sources: &[(&str, &str)], name: &str) -> (DeclarationResolver, crate::model::DeclId) {
        let mut resolver = DeclarationResolver::new(ModelConfig::default());
        for (path, text) in sources {
            let unit = SourceUnit::parse(*path, *text).unwrap();
            resolver.add_source_unit(&unit).unwrap();
        }
        let id = resolver.graph().find(name)[0];
        resolver.load(id).unwrap();
        (resolver, id)
    }

    #[test]
    fn test_properties_and_accessors() {
        let source = r#"
namespace Sample {
    public class Widget {
        public int Both { get; set; }
        public string ReadOnly { get; }
        public bool InitOnly { get; init; }
        public long Computed => 42;
        private int field;
    }
}"#;
        let (resolver, id) = load(&[("Widget.cs", source)], "Sample.Widget");
        let widget = resolver.graph().get(id);
        let found: Vec<(&str, bool, bool)> = widget
            .properties()
            .map(|p| (p.name.as_str(), p.has_getter, p.has_setter))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Both", true, true),
                ("ReadOnly", true, false),
                ("InitOnly", true, true),
                ("Computed", true, false),
            ]
        );
        assert_eq!(widget.members()[0].syntax().text(), "public int Both { get; set; }");
    }

    #[test]
    fn test_method_signature_pieces() {
        let source = r#"
namespace Sample {
    public interface IStore<TKey> {
        TValue Find<TValue>(TKey key, params TValue[] fallback) where TValue : IStore<TKey>;
        void Clear();
    }
}"#;
        let (resolver, id) = load(&[("Store.cs", source)], "Sample.IStore");
        let graph = resolver.graph();
        let store = graph.get(id);
        let find = store.methods().next().unwrap();
        assert_eq!(find.name, "Find");
        assert_eq!(find.parameters.len(), 2);
        assert_eq!(find.parameters[1].name, "fallback");
        assert_eq!(find.parameters[1].parameter_type.display(graph), "TValue[]");
        match &find.parameters[0].parameter_type {
            DeclarationUse::GenericParameter { owner, position, .. } => {
                assert_eq!(*owner, GenericParameterOwner::Type);
                assert_eq!(*position, 0);
            }
            other => panic!("expected a type parameter, got {other:?}"),
        }
        assert_eq!(find.generic_parameters[0].constraints[0].declaration(), Some(id));
        assert_eq!(
            store.members()[0].signature(graph),
            "TValue Find<TValue>(TKey key, TValue[] fallback)"
        );
        let clear = store.methods().nth(1).unwrap();
        assert_eq!(clear.return_type, DeclarationUse::predefined(PredefinedType::Void));
    }

    #[test]
    fn test_bases_and_constraints() {
        let source = r#"
namespace Sample {
    public interface IShape { }
    public abstract class Shape { }
    public class Circle<T> : Shape, IShape where T : IShape, new() { }
}"#;
        let (resolver, id) = load(&[("Shapes.cs", source)], "Sample.Circle");
        let graph = resolver.graph();
        let circle = graph.get(id);
        let bases: Vec<&str> = circle.extends().iter().map(|b| b.full_name(graph)).collect();
        assert_eq!(bases, vec!["Sample.Shape", "Sample.IShape"]);
        assert_eq!(circle.generic_parameters()[0].name, "T");
        assert_eq!(circle.generic_parameters()[0].constraints.len(), 1);
    }

    #[test]
    fn test_record_primary_constructor_base() {
        let source = "namespace Sample { public record Base(int X); public record Derived(int X, int Y) : Base(X); }";
        let (resolver, id) = load(&[("Records.cs", source)], "Sample.Derived");
        let graph = resolver.graph();
        let derived = graph.get(id);
        assert_eq!(derived.extends().len(), 1);
        assert_eq!(derived.extends()[0].full_name(graph), "Sample.Base");
    }

    #[test]
    fn test_attributes_on_type_and_member() {
        let source = r#"
namespace Sample {
    public class PatternAttribute { }
    [Pattern]
    public class Widget {
        [Pattern] public int Count { get; }
        [return: Pattern] public int Make() => 0;
    }
}"#;
        let (resolver, id) = load(&[("Widget.cs", source)], "Sample.Widget");
        let graph = resolver.graph();
        let widget = graph.get(id);
        assert!(widget.has_attribute("PatternAttribute"));
        assert_eq!(widget.attributes()[0].syntax.text(), "Pattern");
        assert_eq!(widget.members()[0].attributes().len(), 1);
        assert!(widget.members()[1].attributes().is_empty());
    }

    #[test]
    fn test_enum_loads_attributes_only() {
        let source = "namespace Sample { class MarkAttribute { } [Mark] enum Color : byte { Red, Green } }";
        let (resolver, id) = load(&[("Color.cs", source)], "Sample.Color");
        let color = resolver.graph().get(id);
        assert!(color.extends().is_empty());
        assert!(color.members().is_empty());
        assert_eq!(color.attributes().len(), 1);
    }
}
