//! Compiled-module metadata: ECMA-335 tables, heaps and blob codecs.
//!
//! The core never opens binaries. A [`MetadataReader`] is handed in by the
//! embedder, usually built with [`ModuleBuilder`].

pub mod attribute_value;
pub mod builder;
pub mod heap;
pub mod module;
pub mod signature;
pub mod tables;

pub use attribute_value::{AttributeArgument, AttributeValue, NamedArgument};
pub use builder::ModuleBuilder;
pub use heap::{BlobHeap, BlobIndex, StringHeap, StringIndex};
pub use module::{LoadedModule, RuntimeType};
pub use signature::{MethodSignature, PropertySignature, SignatureType};
pub use tables::{
    method_attributes, split_generic_arity, type_attributes, AssemblyReferenceHandle,
    CustomAttributeConstructor, GenericParameterHandle, HasCustomAttribute, MemberReferenceHandle,
    MetadataReader, MethodDefinitionHandle, ParameterHandle, PropertyHandle, ResolutionScope,
    TypeDefOrRef, TypeDefinitionHandle, TypeOrMethodDef, TypeReferenceHandle,
    TypeSpecificationHandle,
};
