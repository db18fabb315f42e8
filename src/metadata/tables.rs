//! Metadata tables and the read-only cursor over them.
//!
//! Rows are stored in table order; handles are 1-based row numbers as in
//! ECMA-335. Ownership lists (`method_list`, `param_list`, `property_list`)
//! run from a row's start to the next row's start.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use super::heap::{BlobHeap, BlobIndex, StringHeap, StringIndex};
use crate::error::{ModelError, Result};

macro_rules! row_handle {
    ($(#[$meta:meta])* $name:ident, $table:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const TABLE: &'static str = $table;

            /// Handle for a 1-based row number.
            pub fn from_row(row: u32) -> Self {
                Self(row)
            }

            pub fn row(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}[{}]", $table, self.0)
            }
        }
    };
}

row_handle!(TypeDefinitionHandle, "TypeDef");
row_handle!(TypeReferenceHandle, "TypeRef");
row_handle!(TypeSpecificationHandle, "TypeSpec");
row_handle!(AssemblyReferenceHandle, "AssemblyRef");
row_handle!(MethodDefinitionHandle, "MethodDef");
row_handle!(ParameterHandle, "Param");
row_handle!(MemberReferenceHandle, "MemberRef");
row_handle!(PropertyHandle, "Property");
row_handle!(GenericParameterHandle, "GenericParam");

/// `TypeDefOrRef` coded index; also the token kind signatures carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDefOrRef {
    TypeDef(TypeDefinitionHandle),
    TypeRef(TypeReferenceHandle),
    TypeSpec(TypeSpecificationHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// Defined in the current module.
    Module,
    AssemblyRef(AssemblyReferenceHandle),
    /// Nested inside another referenced type.
    TypeRef(TypeReferenceHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HasCustomAttribute {
    TypeDef(TypeDefinitionHandle),
    MethodDef(MethodDefinitionHandle),
    Param(ParameterHandle),
    Property(PropertyHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomAttributeConstructor {
    MethodDef(MethodDefinitionHandle),
    MemberRef(MemberReferenceHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOrMethodDef {
    TypeDef(TypeDefinitionHandle),
    MethodDef(MethodDefinitionHandle),
}

pub mod type_attributes {
    pub const PUBLIC: u32 = 0x0000_0001;
    pub const INTERFACE: u32 = 0x0000_0020;
    pub const ABSTRACT: u32 = 0x0000_0080;
    pub const SEALED: u32 = 0x0000_0100;
}

pub mod method_attributes {
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const VIRTUAL: u16 = 0x0040;
    pub const HIDE_BY_SIG: u16 = 0x0080;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SPECIAL_NAME: u16 = 0x0800;
    pub const RT_SPECIAL_NAME: u16 = 0x1000;
}

pub mod method_semantics {
    pub const SETTER: u16 = 0x0001;
    pub const GETTER: u16 = 0x0002;
}

// ─── Rows ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeDefinitionRow {
    pub flags: u32,
    pub name: StringIndex,
    pub namespace: StringIndex,
    pub extends: Option<TypeDefOrRef>,
    pub method_list: u32,
}

#[derive(Debug, Clone)]
pub struct TypeReferenceRow {
    pub scope: ResolutionScope,
    pub name: StringIndex,
    pub namespace: StringIndex,
}

#[derive(Debug, Clone)]
pub struct TypeSpecificationRow {
    pub signature: BlobIndex,
}

#[derive(Debug, Clone)]
pub struct AssemblyReferenceRow {
    pub name: StringIndex,
}

#[derive(Debug, Clone)]
pub struct MethodDefinitionRow {
    pub flags: u16,
    pub name: StringIndex,
    pub signature: BlobIndex,
    pub param_list: u32,
}

#[derive(Debug, Clone)]
pub struct ParameterRow {
    pub flags: u16,
    /// 0 is the return value; parameters count from 1.
    pub sequence: u16,
    pub name: StringIndex,
}

#[derive(Debug, Clone)]
pub struct InterfaceImplementationRow {
    pub class: TypeDefinitionHandle,
    pub interface: TypeDefOrRef,
}

#[derive(Debug, Clone)]
pub struct MemberReferenceRow {
    pub parent: TypeDefOrRef,
    pub name: StringIndex,
    pub signature: BlobIndex,
}

#[derive(Debug, Clone)]
pub struct CustomAttributeRow {
    pub parent: HasCustomAttribute,
    pub constructor: CustomAttributeConstructor,
    pub value: BlobIndex,
}

#[derive(Debug, Clone)]
pub struct PropertyMapRow {
    pub parent: TypeDefinitionHandle,
    pub property_list: u32,
}

#[derive(Debug, Clone)]
pub struct PropertyRow {
    pub flags: u16,
    pub name: StringIndex,
    pub signature: BlobIndex,
}

#[derive(Debug, Clone)]
pub struct MethodSemanticsRow {
    pub semantics: u16,
    pub method: MethodDefinitionHandle,
    pub association: PropertyHandle,
}

#[derive(Debug, Clone)]
pub struct GenericParameterRow {
    pub number: u16,
    pub flags: u16,
    pub owner: TypeOrMethodDef,
    pub name: StringIndex,
}

#[derive(Debug, Clone)]
pub struct GenericParameterConstraintRow {
    pub owner: GenericParameterHandle,
    pub constraint: TypeDefOrRef,
}

/// Getter and setter of a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyAccessors {
    pub getter: Option<MethodDefinitionHandle>,
    pub setter: Option<MethodDefinitionHandle>,
}

// ─── Reader ─────────────────────────────────────────────────────

/// The tables and heaps of one module.
#[derive(Default)]
pub struct MetadataReader {
    pub(crate) assembly_name: String,
    pub(crate) strings: StringHeap,
    pub(crate) blobs: BlobHeap,
    pub(crate) type_definitions: Vec<TypeDefinitionRow>,
    pub(crate) type_references: Vec<TypeReferenceRow>,
    pub(crate) type_specifications: Vec<TypeSpecificationRow>,
    pub(crate) assembly_references: Vec<AssemblyReferenceRow>,
    pub(crate) method_definitions: Vec<MethodDefinitionRow>,
    pub(crate) parameters: Vec<ParameterRow>,
    pub(crate) interface_implementations: Vec<InterfaceImplementationRow>,
    pub(crate) member_references: Vec<MemberReferenceRow>,
    pub(crate) custom_attributes: Vec<CustomAttributeRow>,
    pub(crate) property_maps: Vec<PropertyMapRow>,
    pub(crate) properties: Vec<PropertyRow>,
    pub(crate) method_semantics: Vec<MethodSemanticsRow>,
    pub(crate) generic_parameters: Vec<GenericParameterRow>,
    pub(crate) generic_parameter_constraints: Vec<GenericParameterConstraintRow>,
    type_index: OnceCell<HashMap<(String, String), TypeDefinitionHandle>>,
}

fn row<'a, T>(table: &'a [T], row: u32, name: &str) -> Result<&'a T> {
    (row as usize)
        .checked_sub(1)
        .and_then(|i| table.get(i))
        .ok_or_else(|| ModelError::malformed(format!("{name} row {row} is absent from its table")))
}

/// Rows `start..next_start` of a list column; the last owner runs to the table end.
fn list_range(start: u32, next_start: Option<u32>, table_len: usize) -> std::ops::Range<u32> {
    let end = next_start.unwrap_or(table_len as u32 + 1);
    start..end.max(start)
}

impl MetadataReader {
    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    pub fn string(&self, index: StringIndex) -> Result<&str> {
        self.strings.get(index)
    }

    pub fn blob(&self, index: BlobIndex) -> Result<&[u8]> {
        self.blobs.get(index)
    }

    pub fn type_definitions(&self) -> impl Iterator<Item = TypeDefinitionHandle> {
        (1..=self.type_definitions.len() as u32).map(TypeDefinitionHandle)
    }

    pub fn type_definition(&self, handle: TypeDefinitionHandle) -> Result<&TypeDefinitionRow> {
        row(&self.type_definitions, handle.0, TypeDefinitionHandle::TABLE)
    }

    pub fn type_reference(&self, handle: TypeReferenceHandle) -> Result<&TypeReferenceRow> {
        row(&self.type_references, handle.0, TypeReferenceHandle::TABLE)
    }

    pub fn type_specification(&self, handle: TypeSpecificationHandle) -> Result<&TypeSpecificationRow> {
        row(&self.type_specifications, handle.0, TypeSpecificationHandle::TABLE)
    }

    pub fn assembly_reference(&self, handle: AssemblyReferenceHandle) -> Result<&AssemblyReferenceRow> {
        row(&self.assembly_references, handle.0, AssemblyReferenceHandle::TABLE)
    }

    pub fn method_definition(&self, handle: MethodDefinitionHandle) -> Result<&MethodDefinitionRow> {
        row(&self.method_definitions, handle.0, MethodDefinitionHandle::TABLE)
    }

    pub fn parameter(&self, handle: ParameterHandle) -> Result<&ParameterRow> {
        row(&self.parameters, handle.0, ParameterHandle::TABLE)
    }

    pub fn member_reference(&self, handle: MemberReferenceHandle) -> Result<&MemberReferenceRow> {
        row(&self.member_references, handle.0, MemberReferenceHandle::TABLE)
    }

    pub fn property(&self, handle: PropertyHandle) -> Result<&PropertyRow> {
        row(&self.properties, handle.0, PropertyHandle::TABLE)
    }

    pub fn generic_parameter(&self, handle: GenericParameterHandle) -> Result<&GenericParameterRow> {
        row(&self.generic_parameters, handle.0, GenericParameterHandle::TABLE)
    }

    /// Methods owned by a type, in table order.
    pub fn methods_of(&self, handle: TypeDefinitionHandle) -> Result<impl Iterator<Item = MethodDefinitionHandle>> {
        let start = self.type_definition(handle)?.method_list;
        let next = self.type_definitions.get(handle.0 as usize).map(|r| r.method_list);
        Ok(list_range(start, next, self.method_definitions.len()).map(MethodDefinitionHandle))
    }

    /// Parameter rows of a method, in table order (sequence 0 included if present).
    pub fn parameters_of(&self, handle: MethodDefinitionHandle) -> Result<impl Iterator<Item = ParameterHandle>> {
        let start = self.method_definition(handle)?.param_list;
        let next = self.method_definitions.get(handle.0 as usize).map(|r| r.param_list);
        Ok(list_range(start, next, self.parameters.len()).map(ParameterHandle))
    }

    /// Properties owned by a type, in table order.
    pub fn properties_of(&self, handle: TypeDefinitionHandle) -> Vec<PropertyHandle> {
        let Some(position) = self.property_maps.iter().position(|m| m.parent == handle) else {
            return Vec::new();
        };
        let start = self.property_maps[position].property_list;
        let next = self.property_maps.get(position + 1).map(|m| m.property_list);
        list_range(start, next, self.properties.len())
            .map(PropertyHandle)
            .collect()
    }

    /// Generic parameters of a type or method, ordered by number.
    pub fn generic_parameters_of(&self, owner: TypeOrMethodDef) -> Vec<GenericParameterHandle> {
        let mut found: Vec<(u16, GenericParameterHandle)> = self
            .generic_parameters
            .iter()
            .enumerate()
            .filter(|(_, r)| r.owner == owner)
            .map(|(i, r)| (r.number, GenericParameterHandle(i as u32 + 1)))
            .collect();
        found.sort_by_key(|(number, _)| *number);
        found.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn constraints_of(&self, parameter: GenericParameterHandle) -> Vec<TypeDefOrRef> {
        self.generic_parameter_constraints
            .iter()
            .filter(|r| r.owner == parameter)
            .map(|r| r.constraint)
            .collect()
    }

    /// Interfaces implemented by a type, in table order.
    pub fn interfaces_of(&self, handle: TypeDefinitionHandle) -> Vec<TypeDefOrRef> {
        self.interface_implementations
            .iter()
            .filter(|r| r.class == handle)
            .map(|r| r.interface)
            .collect()
    }

    pub fn custom_attributes_of(&self, parent: HasCustomAttribute) -> Vec<&CustomAttributeRow> {
        self.custom_attributes
            .iter()
            .filter(|r| r.parent == parent)
            .collect()
    }

    pub fn accessors_of(&self, property: PropertyHandle) -> PropertyAccessors {
        let mut accessors = PropertyAccessors::default();
        for semantics in self.method_semantics.iter().filter(|r| r.association == property) {
            if semantics.semantics & method_semantics::GETTER != 0 {
                accessors.getter = Some(semantics.method);
            }
            if semantics.semantics & method_semantics::SETTER != 0 {
                accessors.setter = Some(semantics.method);
            }
        }
        accessors
    }

    /// The type whose method list contains `method`.
    pub fn declaring_type_of(&self, method: MethodDefinitionHandle) -> Option<TypeDefinitionHandle> {
        self.type_definitions().find(|&handle| {
            self.methods_of(handle)
                .map(|mut methods| methods.any(|m| m == method))
                .unwrap_or(false)
        })
    }

    /// Look up a type definition by namespace and raw (arity-suffixed) name.
    pub fn find_type_definition(&self, namespace: &str, name: &str) -> Option<TypeDefinitionHandle> {
        let index = self.type_index.get_or_init(|| {
            self.type_definitions()
                .filter_map(|handle| {
                    let (namespace, name) = self.type_definition_name(handle).ok()?;
                    Some(((namespace.to_string(), name.to_string()), handle))
                })
                .collect()
        });
        index.get(&(namespace.to_string(), name.to_string())).copied()
    }

    /// `(namespace, raw name)` of a type definition.
    pub fn type_definition_name(&self, handle: TypeDefinitionHandle) -> Result<(&str, &str)> {
        let row = self.type_definition(handle)?;
        Ok((self.string(row.namespace)?, self.string(row.name)?))
    }

    /// `(namespace, raw name)` of a definition or reference; `None` for type specs.
    pub fn type_name(&self, token: TypeDefOrRef) -> Result<Option<(&str, &str)>> {
        match token {
            TypeDefOrRef::TypeDef(handle) => self.type_definition_name(handle).map(Some),
            TypeDefOrRef::TypeRef(handle) => {
                let row = self.type_reference(handle)?;
                Ok(Some((self.string(row.namespace)?, self.string(row.name)?)))
            }
            TypeDefOrRef::TypeSpec(_) => Ok(None),
        }
    }

    /// Name of the assembly a type reference points into; the own assembly for module scope.
    pub fn reference_assembly(&self, handle: TypeReferenceHandle) -> Result<&str> {
        let mut scope = self.type_reference(handle)?.scope;
        loop {
            match scope {
                ResolutionScope::Module => return Ok(&self.assembly_name),
                ResolutionScope::AssemblyRef(assembly) => {
                    return self.string(self.assembly_reference(assembly)?.name)
                }
                ResolutionScope::TypeRef(outer) => scope = self.type_reference(outer)?.scope,
            }
        }
    }
}

impl fmt::Debug for MetadataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataReader")
            .field("assembly", &self.assembly_name)
            .field("type_definitions", &self.type_definitions.len())
            .field("type_references", &self.type_references.len())
            .field("methods", &self.method_definitions.len())
            .finish()
    }
}

/// Split a raw metadata name into the plain name and its generic arity
/// (``Pair`2`` is `("Pair", 2)`).
pub fn split_generic_arity(raw: &str) -> (&str, usize) {
    match raw.rsplit_once('`') {
        Some((name, arity)) => match arity.parse() {
            Ok(arity) => (name, arity),
            Err(_) => (raw, 0),
        },
        None => (raw, 0),
    }
}
