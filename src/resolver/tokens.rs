//! Resolution of metadata tokens, signatures and runtime types.

use std::rc::Rc;
use tracing::trace;

use super::names::split_metadata_name;
use super::{DeclarationResolver, ResolveScope};
use crate::error::{ModelError, Result};
use crate::metadata::{
    split_generic_arity, MetadataReader, RuntimeType, SignatureType, TypeDefOrRef, TypeDefinitionHandle,
};
use crate::model::{
    full_name_of, ArraySpecification, DeclId, DeclarationUse, GenericParameterOwner, PredefinedType,
};

impl DeclarationResolver {
    /// The node for a type definition of a module, created unloaded on first use.
    pub(crate) fn definition(
        &mut self,
        reader: &Rc<MetadataReader>,
        location: &str,
        handle: TypeDefinitionHandle,
    ) -> Result<DeclId> {
        let (namespace, raw_name) = reader.type_definition_name(handle)?;
        let (name, arity) = split_generic_arity(raw_name);
        let full_name = full_name_of(namespace, name);
        if let Some(id) = self.graph().find_qualified(&full_name, arity, location) {
            return Ok(id);
        }
        let declaration = self.factory().create_from_metadata(reader, handle, location)?;
        Ok(self.graph_mut().add(declaration))
    }

    /// Resolve a TypeDef, TypeRef or TypeSpec token read from `reader`.
    pub(crate) fn resolve_token(
        &mut self,
        reader: &Rc<MetadataReader>,
        location: &str,
        token: TypeDefOrRef,
        scope: &ResolveScope,
    ) -> Result<DeclarationUse> {
        let use_site = match token {
            TypeDefOrRef::TypeDef(handle) => DeclarationUse::generic(self.definition(reader, location, handle)?),
            TypeDefOrRef::TypeRef(handle) => {
                let row = reader.type_reference(handle)?;
                let (namespace, raw_name) = (reader.string(row.namespace)?, reader.string(row.name)?);
                let assembly = reader.reference_assembly(handle)?.to_string();
                let metadata_name = full_name_of(namespace, raw_name);
                self.resolve_external(&metadata_name, &assembly, scope)?
            }
            TypeDefOrRef::TypeSpec(handle) => {
                let blob = reader.blob(reader.type_specification(handle)?.signature)?;
                let signature = SignatureType::from_blob(blob)?;
                return self.resolve_signature(reader, location, &signature, scope);
            }
        };
        self.after_resolve(&use_site)?;
        Ok(use_site)
    }

    /// Resolve a signature type. Type and method generic parameters are named
    /// from `scope`; by-ref and pointer wrappers are dropped.
    pub(crate) fn resolve_signature(
        &mut self,
        reader: &Rc<MetadataReader>,
        location: &str,
        signature: &SignatureType,
        scope: &ResolveScope,
    ) -> Result<DeclarationUse> {
        match signature {
            SignatureType::Primitive(ty) => Ok(DeclarationUse::predefined(*ty)),
            SignatureType::Class(token) | SignatureType::ValueType(token) => {
                self.resolve_token(reader, location, *token, scope)
            }
            SignatureType::GenericInstance { generic, arguments, .. } => {
                // `T?` over a value type is stored as `Nullable<T>` and loads as `T`.
                if let [argument] = arguments.as_slice() {
                    if reader.type_name(*generic)? == Some(("System", "Nullable`1")) {
                        return self.resolve_signature(reader, location, argument, scope);
                    }
                }
                let arguments = arguments
                    .iter()
                    .map(|argument| self.resolve_signature(reader, location, argument, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self
                    .resolve_token(reader, location, *generic, scope)?
                    .with_generic_arguments(arguments))
            }
            SignatureType::TypeParameter(position) => {
                signature_parameter(&scope.type_parameters, *position, GenericParameterOwner::Type, scope)
            }
            SignatureType::MethodParameter(position) => {
                signature_parameter(&scope.method_parameters, *position, GenericParameterOwner::Method, scope)
            }
            SignatureType::SzArray(element) => {
                let element = self.resolve_signature(reader, location, element, scope)?;
                let spec = ArraySpecification::wrap_rank(element.array_specification().cloned(), 1);
                Ok(element.with_array(Some(spec)))
            }
            SignatureType::Array { element, rank } => {
                let element = self.resolve_signature(reader, location, element, scope)?;
                let spec = ArraySpecification::wrap_rank(element.array_specification().cloned(), *rank);
                Ok(element.with_array(Some(spec)))
            }
            SignatureType::ByRef(inner) | SignatureType::Pointer(inner) => {
                self.resolve_signature(reader, location, inner, scope)
            }
        }
    }

    /// Resolve a runtime type: the predefined table, then the graph, then
    /// the type's own module. Generic arguments and array shape are carried.
    pub fn resolve_type(&mut self, ty: &RuntimeType) -> Result<DeclarationUse> {
        let (full_name, arity) = split_metadata_name(ty.full_name());
        let location = ty.module().location().to_string();

        let target = if arity == 0 && ty.generic_arguments().is_empty() {
            PredefinedType::from_clr_name(&full_name).map(DeclarationUse::predefined)
        } else {
            None
        };
        let use_site = match target {
            Some(predefined) => predefined,
            None => {
                let id = match self.graph().lookup(&full_name, arity, Some(&location)) {
                    Some(id) => id,
                    None => match ty.definition() {
                        Some(handle) => self.definition(ty.module().reader(), &location, handle)?,
                        None => {
                            return Err(ModelError::UnresolvedReference {
                                reference: ty.full_name().to_string(),
                                requester: ty.full_name().to_string(),
                                location,
                            })
                        }
                    },
                };
                let arguments = ty
                    .generic_arguments()
                    .iter()
                    .map(|argument| self.resolve_type(argument))
                    .collect::<Result<Vec<_>>>()?;
                DeclarationUse::generic(id).with_generic_arguments(arguments)
            }
        };
        let use_site = use_site.with_array(ty.array().cloned());
        self.after_resolve(&use_site)?;
        Ok(use_site)
    }

    /// A type referenced from another assembly, found by its metadata name.
    fn resolve_external(&mut self, metadata_name: &str, assembly: &str, scope: &ResolveScope) -> Result<DeclarationUse> {
        let (full_name, arity) = split_metadata_name(metadata_name);
        if arity == 0 {
            if let Some(ty) = PredefinedType::from_clr_name(&full_name) {
                return Ok(DeclarationUse::predefined(ty));
            }
        }

        let home = self
            .module_for_assembly(assembly)
            .map(|m| (Rc::clone(m.reader()), m.location().to_string()));
        if let Some(id) = self
            .graph()
            .lookup(&full_name, arity, home.as_ref().map(|(_, location)| location.as_str()))
        {
            return Ok(DeclarationUse::generic(id));
        }

        let (namespace, raw_name) = metadata_name.rsplit_once('.').unwrap_or(("", metadata_name));
        if let Some((reader, location)) = &home {
            if let Some(handle) = reader.find_type_definition(namespace, raw_name) {
                trace!(name = metadata_name, assembly, "resolved reference in its home module");
                return Ok(DeclarationUse::generic(self.definition(reader, location, handle)?));
            }
        }
        if let Some(id) = self.find_in_modules(&full_name, arity)? {
            return Ok(DeclarationUse::generic(id));
        }

        Err(ModelError::UnresolvedReference {
            reference: full_name,
            requester: scope.requester.clone(),
            location: scope.location.clone(),
        })
    }
}

fn signature_parameter(
    names: &[String],
    position: u32,
    owner: GenericParameterOwner,
    scope: &ResolveScope,
) -> Result<DeclarationUse> {
    let name = names.get(position as usize).ok_or_else(|| {
        ModelError::malformed(format!(
            "generic parameter {position} is out of range in {} ({})",
            scope.requester, scope.location
        ))
    })?;
    Ok(DeclarationUse::GenericParameter {
        name: name.clone(),
        position: position as usize,
        owner,
        array: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoadPolicy, ModelConfig};
    use crate::metadata::{type_attributes, LoadedModule, ModuleBuilder};
    use crate::parser::SourceUnit;

    fn library() -> LoadedModule {
        let mut builder = ModuleBuilder::new("Sample.Library");
        let object = builder.external_type("System.Runtime", "System", "Object");
        builder.define_type(type_attributes::PUBLIC, "Sample", "Pair`2", Some(object));
        builder.define_type(type_attributes::PUBLIC, "Sample", "Widget", Some(object));
        LoadedModule::new(builder.finish(), "lib/Sample.Library.dll")
    }

    #[test]
    fn test_definition_is_created_once() {
        let module = library();
        let mut resolver = DeclarationResolver::default();
        let reader = Rc::clone(module.reader());
        let handle = reader.find_type_definition("Sample", "Widget").unwrap();
        let first = resolver.definition(&reader, module.location(), handle).unwrap();
        let second = resolver.definition(&reader, module.location(), handle).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.graph().len(), 1);
    }

    #[test]
    fn test_resolve_type_with_arguments_and_array() {
        let module = library();
        let mut resolver = DeclarationResolver::default();
        resolver.add_module(module.clone());
        let ty = module
            .runtime_type("Sample.Pair`2")
            .with_generic_arguments(vec![
                module.runtime_type("System.String"),
                module.runtime_type("Sample.Widget"),
            ])
            .with_array(ArraySpecification::new(1));
        let resolved = resolver.resolve_type(&ty).unwrap();
        assert_eq!(resolved.display(resolver.graph()), "Pair<string, Widget>[]");
        assert_eq!(resolved.full_name(resolver.graph()), "Sample.Pair");
    }

    #[test]
    fn test_resolve_type_prefers_existing_node() {
        let module = library();
        let mut resolver = DeclarationResolver::default();
        let ids = resolver.import_module(module.clone()).unwrap();
        let resolved = resolver.resolve_type(&module.runtime_type("Sample.Widget")).unwrap();
        assert_eq!(resolved.declaration(), Some(ids[1]));
        assert_eq!(resolver.graph().len(), 2);
    }

    #[test]
    fn test_resolve_type_missing() {
        let module = library();
        let mut resolver = DeclarationResolver::default();
        let err = resolver.resolve_type(&module.runtime_type("Sample.Missing")).unwrap_err();
        assert!(matches!(err, ModelError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_type_reference_finds_source_declaration() {
        let mut builder = ModuleBuilder::new("Sample.Consumer");
        let shape = builder.external_type("Sample.Shapes", "Sample", "IShape");
        let module = LoadedModule::new(builder.finish(), "lib/Sample.Consumer.dll");
        let reader = Rc::clone(module.reader());

        let mut resolver = DeclarationResolver::new(ModelConfig::default().with_load_policy(LoadPolicy::Lazy));
        let unit = SourceUnit::parse("Shapes.cs", "namespace Sample { interface IShape { } }").unwrap();
        let ids = resolver.add_source_unit(&unit).unwrap();
        resolver.add_module(module);

        let scope = ResolveScope::global("Sample.Consumer", "lib/Sample.Consumer.dll");
        let resolved = resolver
            .resolve_token(&reader, "lib/Sample.Consumer.dll", shape, &scope)
            .unwrap();
        assert_eq!(resolved.declaration(), Some(ids[0]));
    }

    #[test]
    fn test_signature_arrays_and_parameters() {
        let module = library();
        let reader = Rc::clone(module.reader());
        let mut resolver = DeclarationResolver::default();
        let scope = ResolveScope::global("Sample.Pair", module.location())
            .with_type_parameters(vec!["TFirst".to_string(), "TSecond".to_string()]);

        let jagged = SignatureType::SzArray(Box::new(SignatureType::Array {
            element: Box::new(SignatureType::TypeParameter(1)),
            rank: 2,
        }));
        let resolved = resolver
            .resolve_signature(&reader, module.location(), &jagged, &scope)
            .unwrap();
        assert_eq!(resolved.display(resolver.graph()), "TSecond[][,]");

        let by_ref = SignatureType::ByRef(Box::new(SignatureType::Primitive(PredefinedType::Int)));
        let resolved = resolver
            .resolve_signature(&reader, module.location(), &by_ref, &scope)
            .unwrap();
        assert_eq!(resolved, DeclarationUse::predefined(PredefinedType::Int));

        let missing = SignatureType::MethodParameter(0);
        assert!(matches!(
            resolver.resolve_signature(&reader, module.location(), &missing, &scope),
            Err(ModelError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_nullable_value_types_unwrap() {
        let mut builder = ModuleBuilder::new("Sample.Library");
        let nullable = builder.external_type("System.Runtime", "System", "Nullable`1");
        let module = LoadedModule::new(builder.finish(), "lib/Sample.Library.dll");
        let reader = Rc::clone(module.reader());
        let mut resolver = DeclarationResolver::default();
        let scope = ResolveScope::global("Sample.Counter", module.location())
            .with_type_parameters(vec!["T".to_string()]);

        let count = SignatureType::GenericInstance {
            generic: nullable,
            is_value_type: true,
            arguments: vec![SignatureType::Primitive(PredefinedType::Int)],
        };
        let resolved = resolver
            .resolve_signature(&reader, module.location(), &count, &scope)
            .unwrap();
        assert_eq!(resolved, DeclarationUse::predefined(PredefinedType::Int));

        let values = SignatureType::SzArray(Box::new(SignatureType::GenericInstance {
            generic: nullable,
            is_value_type: true,
            arguments: vec![SignatureType::TypeParameter(0)],
        }));
        let resolved = resolver
            .resolve_signature(&reader, module.location(), &values, &scope)
            .unwrap();
        assert_eq!(resolved.display(resolver.graph()), "T[]");
        assert!(resolver.graph().is_empty());
    }
}
