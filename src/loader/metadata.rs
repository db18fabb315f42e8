//! Loading declarations from metadata tables.
//!
//! Produces the same shape the syntax loader does: properties are taken from
//! the Property table at the position of their first accessor, other special
//! methods are dropped, and every member and attribute gets a synthesized
//! C# snippet as its syntax handle.

use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::metadata::{
    method_attributes, AttributeValue, CustomAttributeConstructor, HasCustomAttribute, MetadataReader,
    MethodDefinitionHandle, MethodSignature, PropertyHandle, PropertySignature, TypeDefOrRef, TypeOrMethodDef,
};
use crate::model::member::{method_signature, property_signature};
use crate::model::{
    Attribute, DeclId, DeclarationKind, DeclarationUse, GenericParameter, Member, MetadataSource, MethodDeclaration,
    Parameter, PropertyDeclaration, SyntaxHandle,
};
use crate::resolver::{DeclarationResolver, ResolveScope};

const COMPILER_SERVICES: &str = "System.Runtime.CompilerServices";

/// Per-load context: the module being read and the declaration being filled.
struct MetadataLoader<'a> {
    resolver: &'a mut DeclarationResolver,
    reader: Rc<MetadataReader>,
    location: String,
    id: DeclId,
}

pub(crate) fn load(resolver: &mut DeclarationResolver, id: DeclId, source: &MetadataSource) -> Result<()> {
    let declaration = resolver.graph().get(id);
    let kind = declaration.kind();
    let location = declaration.location().to_string();
    let scope = ResolveScope::global(declaration.full_name(), location.as_str());
    let mut loader = MetadataLoader {
        resolver,
        reader: Rc::clone(&source.reader),
        location,
        id,
    };
    loader.load(source, kind, scope)
}

impl MetadataLoader<'_> {
    fn load(&mut self, source: &MetadataSource, kind: DeclarationKind, scope: ResolveScope) -> Result<()> {
        let handle = source.handle;
        let owner = HasCustomAttribute::TypeDef(handle);
        if kind == DeclarationKind::Enum {
            let attributes = self.attributes(owner, &scope)?;
            self.resolver.graph_mut().get_mut(self.id).attributes = attributes;
            return Ok(());
        }

        let generic_owner = TypeOrMethodDef::TypeDef(handle);
        let names = self.generic_names(generic_owner)?;
        self.resolver.graph_mut().get_mut(self.id).generic_parameters =
            names.iter().map(GenericParameter::new).collect();
        let scope = scope.with_type_parameters(names);
        let constraints = self.constraints(generic_owner, &scope)?;
        for (position, constraint) in constraints {
            let declaration = self.resolver.graph_mut().get_mut(self.id);
            if let Some(parameter) = declaration.generic_parameters.get_mut(position) {
                parameter.constraints.push(constraint);
            }
        }

        let base = self.reader.type_definition(handle)?.extends;
        let mut bases: Vec<TypeDefOrRef> = base.filter(|&b| !self.is_implicit_base(b)).into_iter().collect();
        bases.extend(self.reader.interfaces_of(handle));
        for token in bases {
            let resolved = self.resolver.resolve_token(&self.reader, &self.location, token, &scope)?;
            self.resolver.graph_mut().get_mut(self.id).extends.push(resolved);
        }

        // accessor method -> the property it introduces
        let mut first_accessor: HashMap<MethodDefinitionHandle, (PropertyHandle, bool, bool)> = HashMap::new();
        for property in self.reader.properties_of(handle) {
            let accessors = self.reader.accessors_of(property);
            let first = match (accessors.getter, accessors.setter) {
                (Some(getter), Some(setter)) => Some(getter.min(setter)),
                (getter, setter) => getter.or(setter),
            };
            if let Some(first) = first {
                first_accessor.insert(first, (property, accessors.getter.is_some(), accessors.setter.is_some()));
            }
        }

        let methods: Vec<MethodDefinitionHandle> = self.reader.methods_of(handle)?.collect();
        for method in methods {
            let member = if let Some(&(property, has_getter, has_setter)) = first_accessor.get(&method) {
                Member::Property(self.property(property, has_getter, has_setter, &scope)?)
            } else {
                let row = self.reader.method_definition(method)?;
                let name = self.reader.string(row.name)?;
                let special = method_attributes::SPECIAL_NAME | method_attributes::RT_SPECIAL_NAME;
                if row.flags & special != 0 || name.starts_with('<') {
                    trace!(method = name, "skipping special method");
                    continue;
                }
                Member::Method(self.method(method, &scope)?)
            };
            self.resolver.graph_mut().get_mut(self.id).members.push(member);
        }

        let attributes = self.attributes(owner, &scope)?;
        self.resolver.graph_mut().get_mut(self.id).attributes = attributes;
        debug!(declaration = %scope.requester, location = %self.location, "loaded from metadata");
        Ok(())
    }

    /// `System.Object`, `System.ValueType` and `System.Enum` are implied by the kind.
    fn is_implicit_base(&self, token: TypeDefOrRef) -> bool {
        matches!(
            self.reader.type_name(token),
            Ok(Some(("System", "Object" | "ValueType" | "Enum")))
        )
    }

    fn generic_names(&self, owner: TypeOrMethodDef) -> Result<Vec<String>> {
        self.reader
            .generic_parameters_of(owner)
            .into_iter()
            .map(|gp| {
                let row = self.reader.generic_parameter(gp)?;
                self.reader.string(row.name).map(str::to_string)
            })
            .collect()
    }

    /// Constraints by parameter position. The `System.ValueType` constraint
    /// the compiler emits for `struct` has no counterpart in source.
    fn constraints(&mut self, owner: TypeOrMethodDef, scope: &ResolveScope) -> Result<Vec<(usize, DeclarationUse)>> {
        let mut out = Vec::new();
        for (position, parameter) in self.reader.generic_parameters_of(owner).into_iter().enumerate() {
            for token in self.reader.constraints_of(parameter) {
                if matches!(self.reader.type_name(token)?, Some(("System", "ValueType"))) {
                    continue;
                }
                let resolved = self.resolver.resolve_token(&self.reader, &self.location, token, scope)?;
                out.push((position, resolved));
            }
        }
        Ok(out)
    }

    fn property(
        &mut self,
        handle: PropertyHandle,
        has_getter: bool,
        has_setter: bool,
        scope: &ResolveScope,
    ) -> Result<PropertyDeclaration> {
        let row = self.reader.property(handle)?;
        let name = self.reader.string(row.name)?.to_string();
        let signature = PropertySignature::decode(self.reader.blob(row.signature)?)?;
        let property_type =
            self.resolver
                .resolve_signature(&self.reader, &self.location, &signature.property_type, scope)?;
        let attributes = self.attributes(HasCustomAttribute::Property(handle), scope)?;
        let snippet = format!(
            "public {}",
            property_signature(self.resolver.graph(), &name, &property_type, has_getter, has_setter)
        );
        Ok(PropertyDeclaration {
            name,
            property_type,
            has_getter,
            has_setter,
            attributes,
            syntax: SyntaxHandle::synthesized(snippet, "property_declaration"),
        })
    }

    fn method(&mut self, handle: MethodDefinitionHandle, scope: &ResolveScope) -> Result<MethodDeclaration> {
        let row = self.reader.method_definition(handle)?;
        let name = self.reader.string(row.name)?.to_string();
        let signature = MethodSignature::decode(self.reader.blob(row.signature)?)?;

        let generic_owner = TypeOrMethodDef::MethodDef(handle);
        let generic_names = self.generic_names(generic_owner)?;
        let scope = scope.clone().with_method_parameters(generic_names.clone());

        let return_type = self
            .resolver
            .resolve_signature(&self.reader, &self.location, &signature.return_type, &scope)?;

        let mut parameter_names: HashMap<u16, String> = HashMap::new();
        for parameter in self.reader.parameters_of(handle)? {
            let row = self.reader.parameter(parameter)?;
            if row.sequence > 0 {
                parameter_names.insert(row.sequence, self.reader.string(row.name)?.to_string());
            }
        }
        let mut parameters = Vec::with_capacity(signature.parameters.len());
        for (i, parameter_type) in signature.parameters.iter().enumerate() {
            let name = parameter_names
                .remove(&(i as u16 + 1))
                .unwrap_or_else(|| format!("arg{i}"));
            let parameter_type = self
                .resolver
                .resolve_signature(&self.reader, &self.location, parameter_type, &scope)?;
            parameters.push(Parameter { name, parameter_type });
        }

        let mut generic_parameters: Vec<GenericParameter> = generic_names.iter().map(GenericParameter::new).collect();
        for (position, constraint) in self.constraints(generic_owner, &scope)? {
            if let Some(parameter) = generic_parameters.get_mut(position) {
                parameter.constraints.push(constraint);
            }
        }

        let attributes = self.attributes(HasCustomAttribute::MethodDef(handle), &scope)?;
        let graph = self.resolver.graph();
        let rendered: Vec<(&str, String)> = parameters
            .iter()
            .map(|p| (p.name.as_str(), p.parameter_type.display(graph)))
            .collect();
        let snippet = format!(
            "public {};",
            method_signature(
                &return_type.display(graph),
                &name,
                &generic_names.iter().map(String::as_str).collect::<Vec<_>>(),
                &rendered,
            )
        );
        Ok(MethodDeclaration {
            name,
            return_type,
            parameters,
            generic_parameters,
            attributes,
            syntax: SyntaxHandle::synthesized(snippet, "method_declaration"),
        })
    }

    /// Custom attributes of `parent`, in table order.
    fn attributes(&mut self, parent: HasCustomAttribute, scope: &ResolveScope) -> Result<Vec<Attribute>> {
        let reader = Rc::clone(&self.reader);
        let mut out = Vec::new();
        for row in reader.custom_attributes_of(parent) {
            let (token, constructor_blob) = match row.constructor {
                CustomAttributeConstructor::MethodDef(method) => {
                    let Some(owner) = reader.declaring_type_of(method) else {
                        warn!(%method, location = %self.location, "attribute constructor has no declaring type");
                        continue;
                    };
                    (TypeDefOrRef::TypeDef(owner), reader.method_definition(method)?.signature)
                }
                CustomAttributeConstructor::MemberRef(member) => {
                    let row = reader.member_reference(member)?;
                    (row.parent, row.signature)
                }
            };
            if self.resolver.skip_compiler_attributes()
                && matches!(reader.type_name(token)?, Some((COMPILER_SERVICES, _)))
            {
                continue;
            }

            let declaration = self.resolver.resolve_token(&reader, &self.location, token, scope)?;
            let constructor = MethodSignature::decode(reader.blob(constructor_blob)?)?;
            let value = match AttributeValue::decode(reader.blob(row.value)?, &constructor, &reader) {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, location = %self.location, "unreadable attribute value");
                    AttributeValue::default()
                }
            };
            let name = declaration.name(self.resolver.graph()).to_string();
            let snippet = format!("{name}{}", value.render());
            out.push(Attribute {
                name,
                declaration,
                syntax: SyntaxHandle::synthesized(snippet, "attribute"),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::error::ModelError;
    use crate::metadata::{type_attributes, AttributeArgument, LoadedModule, ModuleBuilder, SignatureType};
    use crate::model::PredefinedType;

    fn library() -> LoadedModule {
        let mut builder = ModuleBuilder::new("Sample.Library");
        let object = builder.external_type("System.Runtime", "System", "Object");
        let attribute = builder.external_type("System.Runtime", "System", "Attribute");
        let nullable = builder.external_type("System.Runtime", COMPILER_SERVICES, "NullableContextAttribute");

        builder.define_type(type_attributes::PUBLIC, "Sample", "PatternAttribute", Some(attribute));
        let pattern_ctor = builder
            .add_constructor(vec![SignatureType::Primitive(PredefinedType::String)], &["pattern"])
            .unwrap();

        let pair = builder.define_type(type_attributes::PUBLIC, "Sample", "Pair`2", Some(object));
        builder.add_generic_parameter(TypeOrMethodDef::TypeDef(pair), "TFirst");
        builder.add_generic_parameter(TypeOrMethodDef::TypeDef(pair), "TSecond");
        builder.add_constructor(Vec::new(), &[]).unwrap();
        builder
            .add_property("First", SignatureType::TypeParameter(0), true, false)
            .unwrap();
        builder
            .add_property("Second", SignatureType::TypeParameter(1), true, true)
            .unwrap();
        let swapped = SignatureType::GenericInstance {
            generic: TypeDefOrRef::TypeDef(pair),
            is_value_type: false,
            arguments: vec![SignatureType::TypeParameter(1), SignatureType::TypeParameter(0)],
        };
        let swap = MethodSignature::instance(swapped, Vec::new());
        builder
            .add_method(method_attributes::PUBLIC, "Swap", &swap, &[])
            .unwrap();
        let with = MethodSignature::instance(
            SignatureType::MethodParameter(0),
            vec![
                SignatureType::SzArray(Box::new(SignatureType::MethodParameter(0))),
                SignatureType::Primitive(PredefinedType::Int),
            ],
        )
        .with_generic_parameters(1);
        let with = builder
            .add_method(method_attributes::PUBLIC, "Pick", &with, &["items"])
            .unwrap();
        builder.add_generic_parameter(TypeOrMethodDef::MethodDef(with), "TItem");

        let value = AttributeValue {
            fixed: vec![AttributeArgument::String(Some("pair".to_string()))],
            ..AttributeValue::default()
        };
        builder
            .add_custom_attribute(
                HasCustomAttribute::TypeDef(pair),
                CustomAttributeConstructor::MethodDef(pattern_ctor),
                &value,
            )
            .unwrap();
        let nullable_ctor = builder
            .member_reference(
                nullable,
                ".ctor",
                &MethodSignature::instance(
                    SignatureType::Primitive(PredefinedType::Void),
                    vec![SignatureType::Primitive(PredefinedType::Byte)],
                ),
            )
            .unwrap();
        let flag = AttributeValue {
            fixed: vec![AttributeArgument::U8(1)],
            ..AttributeValue::default()
        };
        builder
            .add_custom_attribute(
                HasCustomAttribute::TypeDef(pair),
                CustomAttributeConstructor::MemberRef(nullable_ctor),
                &flag,
            )
            .unwrap();
        LoadedModule::new(builder.finish(), "lib/Sample.Library.dll")
    }

    fn load_pair(config: ModelConfig) -> (DeclarationResolver, DeclId) {
        let mut resolver = DeclarationResolver::new(config);
        resolver.import_module(library()).unwrap();
        let id = resolver.graph().find("Sample.Pair")[0];
        resolver.load(id).unwrap();
        (resolver, id)
    }

    #[test]
    fn test_members_in_table_order() {
        let (resolver, id) = load_pair(ModelConfig::default());
        let graph = resolver.graph();
        let pair = graph.get(id);
        let names: Vec<&str> = pair.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["First", "Second", "Swap", "Pick"]);
        let accessors: Vec<(bool, bool)> = pair.properties().map(|p| (p.has_getter, p.has_setter)).collect();
        assert_eq!(accessors, vec![(true, false), (true, true)]);
        assert!(pair.extends().is_empty(), "System.Object is implied");
    }

    #[test]
    fn test_signatures_use_generic_names() {
        let (resolver, id) = load_pair(ModelConfig::default());
        let graph = resolver.graph();
        let pair = graph.get(id);
        let swap = pair.members()[2].as_method().unwrap();
        assert_eq!(swap.return_type.display(graph), "Pair<TSecond, TFirst>");
        assert_eq!(swap.return_type.declaration(), Some(id));

        let pick = pair.members()[3].as_method().unwrap();
        assert_eq!(pick.generic_parameters[0].name, "TItem");
        let names: Vec<&str> = pick.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["items", "arg1"]);
        assert_eq!(pick.syntax.text(), "public TItem Pick<TItem>(TItem[] items, int arg1);");
        assert_eq!(pair.members()[1].syntax().text(), "public TSecond Second { get; set; }");
    }

    #[test]
    fn test_attributes_synthesized() {
        let (resolver, id) = load_pair(ModelConfig::default());
        let pair = resolver.graph().get(id);
        assert_eq!(pair.attributes().len(), 1, "compiler attributes are skipped");
        let pattern = &pair.attributes()[0];
        assert_eq!(pattern.name, "PatternAttribute");
        assert_eq!(pattern.syntax.text(), "PatternAttribute(\"pair\")");
        assert_eq!(pattern.syntax.kind(), "attribute");
        assert!(matches!(pattern.declaration, DeclarationUse::Generic { .. }));
    }

    #[test]
    fn test_compiler_attributes_kept_when_configured() {
        let config = ModelConfig {
            skip_compiler_attributes: false,
            ..ModelConfig::default()
        };
        let mut resolver = DeclarationResolver::new(config);
        resolver.import_module(library()).unwrap();
        let id = resolver.graph().find("Sample.Pair")[0];
        let err = resolver.load(id).unwrap_err();
        assert!(
            matches!(err, ModelError::UnresolvedReference { ref reference, .. } if reference.ends_with("NullableContextAttribute"))
        );
    }
}
