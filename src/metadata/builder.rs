//! In-memory construction of module metadata.
//!
//! Types are defined one after another; methods and properties are added to
//! the most recently defined type, which mirrors how the ECMA list columns
//! assign ownership.

use std::collections::HashMap;

use super::attribute_value::AttributeValue;
use super::signature::{MethodSignature, PropertySignature, SignatureType};
use super::tables::*;
use crate::error::{ModelError, Result};
use crate::model::PredefinedType;

pub struct ModuleBuilder {
    reader: MetadataReader,
    current_type: Option<TypeDefinitionHandle>,
    type_references: HashMap<(ResolutionScope, String, String), TypeReferenceHandle>,
}

impl ModuleBuilder {
    pub fn new(assembly_name: impl Into<String>) -> Self {
        let mut reader = MetadataReader::default();
        reader.assembly_name = assembly_name.into();
        Self {
            reader,
            current_type: None,
            type_references: HashMap::new(),
        }
    }

    pub fn assembly_reference(&mut self, name: &str) -> AssemblyReferenceHandle {
        let index = self.reader.strings.intern(name);
        if let Some(position) = self.reader.assembly_references.iter().position(|r| r.name == index) {
            return AssemblyReferenceHandle::from_row(position as u32 + 1);
        }
        self.reader.assembly_references.push(AssemblyReferenceRow { name: index });
        AssemblyReferenceHandle::from_row(self.reader.assembly_references.len() as u32)
    }

    pub fn type_reference(&mut self, scope: ResolutionScope, namespace: &str, name: &str) -> TypeDefOrRef {
        let key = (scope, namespace.to_string(), name.to_string());
        if let Some(&handle) = self.type_references.get(&key) {
            return TypeDefOrRef::TypeRef(handle);
        }
        let row = TypeReferenceRow {
            scope,
            name: self.reader.strings.intern(name),
            namespace: self.reader.strings.intern(namespace),
        };
        self.reader.type_references.push(row);
        let handle = TypeReferenceHandle::from_row(self.reader.type_references.len() as u32);
        self.type_references.insert(key, handle);
        TypeDefOrRef::TypeRef(handle)
    }

    /// Reference a type of another assembly, adding the assembly reference as needed.
    pub fn external_type(&mut self, assembly: &str, namespace: &str, name: &str) -> TypeDefOrRef {
        let scope = ResolutionScope::AssemblyRef(self.assembly_reference(assembly));
        self.type_reference(scope, namespace, name)
    }

    pub fn type_specification(&mut self, signature: &SignatureType) -> Result<TypeDefOrRef> {
        let blob = signature.to_blob()?;
        let signature = self.reader.blobs.push(&blob)?;
        self.reader.type_specifications.push(TypeSpecificationRow { signature });
        Ok(TypeDefOrRef::TypeSpec(TypeSpecificationHandle::from_row(
            self.reader.type_specifications.len() as u32,
        )))
    }

    /// Start a new type. Following methods and properties belong to it.
    pub fn define_type(
        &mut self,
        flags: u32,
        namespace: &str,
        name: &str,
        extends: Option<TypeDefOrRef>,
    ) -> TypeDefinitionHandle {
        let row = TypeDefinitionRow {
            flags,
            name: self.reader.strings.intern(name),
            namespace: self.reader.strings.intern(namespace),
            extends,
            method_list: self.reader.method_definitions.len() as u32 + 1,
        };
        self.reader.type_definitions.push(row);
        let handle = TypeDefinitionHandle::from_row(self.reader.type_definitions.len() as u32);
        self.current_type = Some(handle);
        handle
    }

    /// Set the base type after the fact, for bases defined later in the module.
    pub fn set_base(&mut self, handle: TypeDefinitionHandle, base: TypeDefOrRef) -> Result<()> {
        let slot = (handle.row() as usize)
            .checked_sub(1)
            .and_then(|i| self.reader.type_definitions.get_mut(i))
            .ok_or_else(|| ModelError::malformed(format!("{handle} is absent from its table")))?;
        slot.extends = Some(base);
        Ok(())
    }

    pub fn add_interface(&mut self, class: TypeDefinitionHandle, interface: TypeDefOrRef) {
        self.reader
            .interface_implementations
            .push(InterfaceImplementationRow { class, interface });
    }

    pub fn add_generic_parameter(&mut self, owner: TypeOrMethodDef, name: &str) -> GenericParameterHandle {
        let number = self
            .reader
            .generic_parameters
            .iter()
            .filter(|r| r.owner == owner)
            .count() as u16;
        let row = GenericParameterRow {
            number,
            flags: 0,
            owner,
            name: self.reader.strings.intern(name),
        };
        self.reader.generic_parameters.push(row);
        GenericParameterHandle::from_row(self.reader.generic_parameters.len() as u32)
    }

    pub fn add_generic_constraint(&mut self, owner: GenericParameterHandle, constraint: TypeDefOrRef) {
        self.reader
            .generic_parameter_constraints
            .push(GenericParameterConstraintRow { owner, constraint });
    }

    /// Add a method to the current type. `parameter_names` pairs with the signature's parameters.
    pub fn add_method(
        &mut self,
        flags: u16,
        name: &str,
        signature: &MethodSignature,
        parameter_names: &[&str],
    ) -> Result<MethodDefinitionHandle> {
        self.require_type()?;
        let blob = signature.encode()?;
        let row = MethodDefinitionRow {
            flags,
            name: self.reader.strings.intern(name),
            signature: self.reader.blobs.push(&blob)?,
            param_list: self.reader.parameters.len() as u32 + 1,
        };
        self.reader.method_definitions.push(row);
        for (i, parameter) in parameter_names.iter().enumerate() {
            let row = ParameterRow {
                flags: 0,
                sequence: i as u16 + 1,
                name: self.reader.strings.intern(parameter),
            };
            self.reader.parameters.push(row);
        }
        Ok(MethodDefinitionHandle::from_row(
            self.reader.method_definitions.len() as u32,
        ))
    }

    pub fn add_constructor(&mut self, parameters: Vec<SignatureType>, parameter_names: &[&str]) -> Result<MethodDefinitionHandle> {
        let signature = MethodSignature::instance(SignatureType::Primitive(PredefinedType::Void), parameters);
        let flags = method_attributes::PUBLIC
            | method_attributes::HIDE_BY_SIG
            | method_attributes::SPECIAL_NAME
            | method_attributes::RT_SPECIAL_NAME;
        self.add_method(flags, ".ctor", &signature, parameter_names)
    }

    /// Add a property to the current type, emitting its accessor methods
    /// and their semantics rows the way a compiler does.
    pub fn add_property(
        &mut self,
        name: &str,
        property_type: SignatureType,
        getter: bool,
        setter: bool,
    ) -> Result<PropertyHandle> {
        let owner = self.require_type()?;
        if self.reader.property_maps.last().map(|m| m.parent) != Some(owner) {
            let property_list = self.reader.properties.len() as u32 + 1;
            self.reader.property_maps.push(PropertyMapRow {
                parent: owner,
                property_list,
            });
        }

        let blob = PropertySignature::instance(property_type.clone()).encode()?;
        let row = PropertyRow {
            flags: 0,
            name: self.reader.strings.intern(name),
            signature: self.reader.blobs.push(&blob)?,
        };
        self.reader.properties.push(row);
        let property = PropertyHandle::from_row(self.reader.properties.len() as u32);

        let flags = method_attributes::PUBLIC | method_attributes::HIDE_BY_SIG | method_attributes::SPECIAL_NAME;
        if getter {
            let signature = MethodSignature::instance(property_type.clone(), Vec::new());
            let method = self.add_method(flags, &format!("get_{name}"), &signature, &[])?;
            self.reader.method_semantics.push(MethodSemanticsRow {
                semantics: method_semantics::GETTER,
                method,
                association: property,
            });
        }
        if setter {
            let signature = MethodSignature::instance(
                SignatureType::Primitive(PredefinedType::Void),
                vec![property_type],
            );
            let method = self.add_method(flags, &format!("set_{name}"), &signature, &["value"])?;
            self.reader.method_semantics.push(MethodSemanticsRow {
                semantics: method_semantics::SETTER,
                method,
                association: property,
            });
        }
        Ok(property)
    }

    pub fn member_reference(
        &mut self,
        parent: TypeDefOrRef,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<MemberReferenceHandle> {
        let blob = signature.encode()?;
        let row = MemberReferenceRow {
            parent,
            name: self.reader.strings.intern(name),
            signature: self.reader.blobs.push(&blob)?,
        };
        self.reader.member_references.push(row);
        Ok(MemberReferenceHandle::from_row(
            self.reader.member_references.len() as u32,
        ))
    }

    pub fn add_custom_attribute(
        &mut self,
        parent: HasCustomAttribute,
        constructor: CustomAttributeConstructor,
        value: &AttributeValue,
    ) -> Result<()> {
        let blob = value.encode()?;
        let value = self.reader.blobs.push(&blob)?;
        self.reader.custom_attributes.push(CustomAttributeRow {
            parent,
            constructor,
            value,
        });
        Ok(())
    }

    pub fn current_type(&self) -> Option<TypeDefinitionHandle> {
        self.current_type
    }

    pub fn finish(self) -> MetadataReader {
        self.reader
    }

    fn require_type(&self) -> Result<TypeDefinitionHandle> {
        self.current_type
            .ok_or_else(|| ModelError::malformed("members need a type; call define_type first"))
    }
}
