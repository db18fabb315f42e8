//! Resolution of written type references.

use tracing::trace;

use super::{DeclarationResolver, ResolveScope};
use crate::error::{ModelError, Result};
use crate::metadata::split_generic_arity;
use crate::model::{
    full_name_of, ArraySpecification, DeclId, DeclarationUse, GenericParameterOwner, PredefinedType,
};
use crate::parser::TypeReference;

const ATTRIBUTE_SUFFIX: &str = "Attribute";

/// A name produced by the enclosing namespaces or a using directive.
enum Candidate {
    Name(String),
    /// The whole reference named an alias whose target has its own arguments.
    Aliased(TypeReference),
}

/// What a name resolved to.
enum Target {
    Declaration(DeclId),
    Predefined(PredefinedType),
    Use(DeclarationUse),
}

impl DeclarationResolver {
    /// Resolve a written reference in `scope`.
    ///
    /// Order: generic parameters in scope, then (a) the exact full name in the
    /// graph, (b) names built from the enclosing namespaces and the using
    /// directives, (c) the predefined table, (d) the loaded modules. Generic
    /// arguments and array shape are carried onto the result.
    pub fn resolve(&mut self, reference: &TypeReference, scope: &ResolveScope) -> Result<DeclarationUse> {
        let (name, generic_arguments, array) = match reference {
            TypeReference::Predefined { ty, array } => {
                return Ok(DeclarationUse::Predefined {
                    ty: *ty,
                    array: array.clone(),
                })
            }
            TypeReference::Named {
                name,
                generic_arguments,
                array,
            } => (name, generic_arguments, array),
        };

        if generic_arguments.is_empty() && !name.contains('.') {
            if let Some(parameter) = generic_parameter(name, scope) {
                return Ok(parameter.with_array(array.clone()));
            }
        }

        let arguments = generic_arguments
            .iter()
            .map(|argument| self.resolve(argument, scope))
            .collect::<Result<Vec<_>>>()?;

        let target = self.resolve_name(name, generic_arguments.len(), scope).ok_or_else(|| {
            ModelError::UnresolvedReference {
                reference: reference.to_string(),
                requester: scope.requester.clone(),
                location: scope.location.clone(),
            }
        })??;

        let use_site = match target {
            Target::Declaration(id) => DeclarationUse::generic(id)
                .with_generic_arguments(arguments)
                .with_array(array.clone()),
            Target::Predefined(ty) => DeclarationUse::Predefined {
                ty,
                array: array.clone(),
            },
            Target::Use(aliased) => {
                let spec = match (aliased.array_specification(), array) {
                    (Some(inner), Some(outer)) => {
                        let mut ranks = outer.ranks.clone();
                        ranks.extend(inner.ranks.iter().copied());
                        Some(ArraySpecification { ranks })
                    }
                    (inner, outer) => outer.clone().or_else(|| inner.cloned()),
                };
                aliased.with_array(spec)
            }
        };
        self.after_resolve(&use_site)?;
        Ok(use_site)
    }

    /// Resolve an attribute name, trying `NameAttribute` before `Name`.
    pub fn resolve_attribute(&mut self, reference: &TypeReference, scope: &ResolveScope) -> Result<DeclarationUse> {
        if let TypeReference::Named {
            name,
            generic_arguments,
            array,
        } = reference
        {
            if !name.ends_with(ATTRIBUTE_SUFFIX) {
                let suffixed = TypeReference::Named {
                    name: format!("{name}{ATTRIBUTE_SUFFIX}"),
                    generic_arguments: generic_arguments.clone(),
                    array: array.clone(),
                };
                // Only a missing suffixed name falls back; failures past the name propagate.
                let written = suffixed.to_string();
                match self.resolve(&suffixed, scope) {
                    Err(ModelError::UnresolvedReference { reference, .. }) if reference == written => {}
                    resolved => return resolved,
                }
            }
        }
        self.resolve(reference, scope)
    }

    /// Resolve a written name to a target. `None` when every strategy fails.
    fn resolve_name(&mut self, name: &str, arity: usize, scope: &ResolveScope) -> Option<Result<Target>> {
        // (a) exact full name
        if let Some(id) = self.graph().lookup(name, arity, Some(&scope.location)) {
            trace!(name, "resolved by exact name");
            return Some(Ok(Target::Declaration(id)));
        }

        // (b) enclosing namespaces, then using directives
        let candidates = candidates(name, scope);
        for candidate in &candidates {
            match candidate {
                Candidate::Name(full_name) => {
                    if let Some(id) = self.graph().lookup(full_name, arity, Some(&scope.location)) {
                        trace!(name, full_name = full_name.as_str(), "resolved through scope");
                        return Some(Ok(Target::Declaration(id)));
                    }
                }
                Candidate::Aliased(target) => {
                    if arity == 0 {
                        trace!(name, target = %target, "resolved through alias");
                        let alias_scope = scope.for_alias_target();
                        return Some(self.resolve(target, &alias_scope).map(Target::Use));
                    }
                }
            }
        }

        // (c) predefined table, by CLR name or simple name
        if arity == 0 {
            let predefined = std::iter::once(name)
                .chain(candidates.iter().filter_map(|c| match c {
                    Candidate::Name(full_name) => Some(full_name.as_str()),
                    Candidate::Aliased(_) => None,
                }))
                .find_map(PredefinedType::from_clr_name);
            if let Some(ty) = predefined {
                trace!(name, %ty, "resolved to predefined type");
                return Some(Ok(Target::Predefined(ty)));
            }
        }

        // (d) loaded modules
        let names = std::iter::once(name.to_string()).chain(candidates.into_iter().filter_map(|c| match c {
            Candidate::Name(full_name) => Some(full_name),
            Candidate::Aliased(_) => None,
        }));
        for full_name in names {
            match self.find_in_modules(&full_name, arity) {
                Ok(Some(id)) => {
                    trace!(name, full_name = full_name.as_str(), "resolved from module");
                    return Some(Ok(Target::Declaration(id)));
                }
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }

    /// Materialize `full_name` from the first module defining it.
    pub(crate) fn find_in_modules(&mut self, full_name: &str, arity: usize) -> Result<Option<DeclId>> {
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        let raw_name = if arity > 0 {
            format!("{name}`{arity}")
        } else {
            name.to_string()
        };
        for (reader, location) in self.module_readers() {
            if let Some(handle) = reader.find_type_definition(namespace, &raw_name) {
                return self.definition(&reader, &location, handle).map(Some);
            }
        }
        Ok(None)
    }
}

fn generic_parameter(name: &str, scope: &ResolveScope) -> Option<DeclarationUse> {
    if let Some(position) = scope.method_parameters.iter().position(|p| p == name) {
        return Some(DeclarationUse::GenericParameter {
            name: name.to_string(),
            position,
            owner: GenericParameterOwner::Method,
            array: None,
        });
    }
    scope
        .type_parameters
        .iter()
        .position(|p| p == name)
        .map(|position| DeclarationUse::GenericParameter {
            name: name.to_string(),
            position,
            owner: GenericParameterOwner::Type,
            array: None,
        })
}

/// Candidate full names for `name`: enclosing namespaces innermost first,
/// then each using directive in declared order.
fn candidates(name: &str, scope: &ResolveScope) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = scope
        .enclosing_namespaces()
        .into_iter()
        .map(|namespace| Candidate::Name(full_name_of(namespace, name)))
        .collect();

    let (head, rest) = match name.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (name, None),
    };
    for directive in &scope.using_directives {
        match directive.split_once('=') {
            Some((alias, target)) => {
                let (alias, target) = (alias.trim(), target.trim());
                if alias != head {
                    continue;
                }
                match rest {
                    Some(rest) => out.push(Candidate::Name(format!("{target}.{rest}"))),
                    None if target.contains('<') => match TypeReference::parse(target) {
                        Ok(reference) => out.push(Candidate::Aliased(reference)),
                        Err(_) => out.push(Candidate::Name(target.to_string())),
                    },
                    None => out.push(Candidate::Name(target.to_string())),
                }
            }
            None => out.push(Candidate::Name(full_name_of(directive.trim(), name))),
        }
    }
    out
}

/// Metadata-style full name (``Ns.Name`N``) to `(full name, arity)`.
pub(crate) fn split_metadata_name(metadata_name: &str) -> (String, usize) {
    let (namespace, raw) = metadata_name.rsplit_once('.').unwrap_or(("", metadata_name));
    let (name, arity) = split_generic_arity(raw);
    (full_name_of(namespace, name), arity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoadPolicy, ModelConfig};
    use crate::parser::SourceUnit;

    fn resolver(sources: &[(&str, &str)]) -> DeclarationResolver {
        let mut resolver = DeclarationResolver::default();
        for (path, text) in sources {
            let unit = SourceUnit::parse(*path, *text).unwrap();
            resolver.add_source_unit(&unit).unwrap();
        }
        resolver
    }

    fn scope(namespace: &str, usings: &[&str]) -> ResolveScope {
        ResolveScope {
            requester: "Sample.Requester".to_string(),
            namespace: namespace.to_string(),
            using_directives: usings.iter().map(|u| u.to_string()).collect(),
            location: "Requester.cs".to_string(),
            ..ResolveScope::default()
        }
    }

    fn reference(text: &str) -> TypeReference {
        TypeReference::parse(text).unwrap()
    }

    #[test]
    fn test_enclosing_namespace_before_usings() {
        let mut resolver = resolver(&[(
            "Shapes.cs",
            "namespace Sample.Core { class Widget { } } namespace Other { class Widget { } }",
        )]);
        let resolved = resolver
            .resolve(&reference("Widget"), &scope("Sample.Core.Inner", &["Other"]))
            .unwrap();
        assert_eq!(resolved.full_name(resolver.graph()), "Sample.Core.Widget");
    }

    #[test]
    fn test_using_directive_order() {
        let mut resolver = resolver(&[(
            "Shapes.cs",
            "namespace First { class Widget { } } namespace Second { class Widget { } }",
        )]);
        let resolved = resolver
            .resolve(&reference("Widget"), &scope("", &["Second", "First"]))
            .unwrap();
        assert_eq!(resolved.full_name(resolver.graph()), "Second.Widget");
    }

    #[test]
    fn test_alias_directive_substitutes_head() {
        let mut resolver = resolver(&[("Shapes.cs", "namespace Sample.Shapes.Round { class Circle { } }")]);
        let resolved = resolver
            .resolve(&reference("R.Circle"), &scope("", &["R = Sample.Shapes.Round"]))
            .unwrap();
        assert_eq!(resolved.full_name(resolver.graph()), "Sample.Shapes.Round.Circle");
    }

    #[test]
    fn test_alias_to_closed_generic() {
        let mut resolver = resolver(&[("Box.cs", "namespace Sample { class Box<T> { } }")]);
        let resolved = resolver
            .resolve(&reference("IntBox[]"), &scope("", &["IntBox = Sample.Box<int>"]))
            .unwrap();
        assert_eq!(resolved.display(resolver.graph()), "Box<int>[]");
    }

    #[test]
    fn test_generic_arity_selects_declaration() {
        let mut resolver = resolver(&[("Box.cs", "namespace Sample { class Box { } class Box<T> { } }")]);
        let plain = resolver.resolve(&reference("Box"), &scope("Sample", &[])).unwrap();
        let generic = resolver.resolve(&reference("Box<string>"), &scope("Sample", &[])).unwrap();
        assert_ne!(plain.declaration(), generic.declaration());
        assert_eq!(generic.generic_arguments().len(), 1);
        assert!(generic.generic_arguments()[0].is_predefined());
    }

    #[test]
    fn test_generic_parameters_in_scope() {
        let mut resolver = resolver(&[]);
        let scope = scope("", &[])
            .with_type_parameters(vec!["TKey".to_string(), "TValue".to_string()])
            .with_method_parameters(vec!["TValue".to_string()]);
        match resolver.resolve(&reference("TValue[]"), &scope).unwrap() {
            DeclarationUse::GenericParameter {
                position,
                owner,
                array,
                ..
            } => {
                assert_eq!(position, 0, "method parameter shadows the type parameter");
                assert_eq!(owner, GenericParameterOwner::Method);
                assert_eq!(array, Some(ArraySpecification::new(1)));
            }
            other => panic!("expected a generic parameter use, got {other:?}"),
        }
    }

    #[test]
    fn test_clr_names_resolve_to_predefined() {
        let mut resolver = resolver(&[]);
        let int32 = resolver.resolve(&reference("Int32"), &scope("", &["System"])).unwrap();
        assert_eq!(int32, DeclarationUse::predefined(PredefinedType::Int));
        let string = resolver.resolve(&reference("System.String"), &scope("", &[])).unwrap();
        assert_eq!(string, DeclarationUse::predefined(PredefinedType::String));
        assert!(resolver.graph().is_empty());
    }

    #[test]
    fn test_attribute_suffix_first() {
        let mut resolver = resolver(&[(
            "Attrs.cs",
            "namespace Sample { class Pattern { } class PatternAttribute : System.Attribute { } }",
        )]);
        let resolved = resolver
            .resolve_attribute(&reference("Pattern"), &scope("Sample", &[]))
            .unwrap();
        assert_eq!(resolved.name(resolver.graph()), "PatternAttribute");
    }

    #[test]
    fn test_attribute_falls_back_only_when_suffixed_name_is_missing() {
        let sources = "namespace Sample { class Marker { } class Pattern { } class PatternAttribute : Missing { } }";
        let mut resolver = DeclarationResolver::new(ModelConfig::default().with_load_policy(LoadPolicy::OnResolve));
        let unit = SourceUnit::parse("Attrs.cs", sources).unwrap();
        resolver.add_source_unit(&unit).unwrap();

        let marker = resolver
            .resolve_attribute(&reference("Marker"), &scope("Sample", &[]))
            .unwrap();
        assert_eq!(marker.full_name(resolver.graph()), "Sample.Marker");

        let err = resolver
            .resolve_attribute(&reference("Pattern"), &scope("Sample", &[]))
            .unwrap_err();
        match err {
            ModelError::UnresolvedReference { reference, requester, .. } => {
                assert_eq!(reference, "Missing");
                assert_eq!(requester, "Sample.PatternAttribute");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn test_on_resolve_policy_loads_targets() {
        let mut resolver = DeclarationResolver::new(ModelConfig::default().with_load_policy(LoadPolicy::OnResolve));
        let unit = SourceUnit::parse("A.cs", "namespace Sample { class Widget { int Count { get; } } }").unwrap();
        let ids = resolver.add_source_unit(&unit).unwrap();
        resolver.resolve(&reference("Sample.Widget"), &scope("", &[])).unwrap();
        assert!(resolver.graph().get(ids[0]).is_loaded());
    }

    #[test]
    fn test_unresolved_reports_reference() {
        let mut resolver = resolver(&[]);
        let err = resolver
            .resolve(&reference("List<Missing>"), &scope("Sample", &["System"]))
            .unwrap_err();
        match err {
            ModelError::UnresolvedReference { reference, requester, .. } => {
                assert_eq!(reference, "Missing");
                assert_eq!(requester, "Sample.Requester");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn test_split_metadata_name() {
        assert_eq!(split_metadata_name("Sample.Pair`2"), ("Sample.Pair".to_string(), 2));
        assert_eq!(split_metadata_name("Widget"), ("Widget".to_string(), 0));
    }
}
