//! Opened modules and runtime type handles.

use std::fmt;
use std::rc::Rc;

use super::tables::{MetadataReader, TypeDefinitionHandle};
use crate::model::ArraySpecification;

/// A module whose metadata is available, with the origin used for its declarations.
#[derive(Clone)]
pub struct LoadedModule {
    reader: Rc<MetadataReader>,
    location: String,
}

impl LoadedModule {
    pub fn new(reader: MetadataReader, location: impl Into<String>) -> Self {
        Self::from_shared(Rc::new(reader), location)
    }

    pub fn from_shared(reader: Rc<MetadataReader>, location: impl Into<String>) -> Self {
        Self {
            reader,
            location: location.into(),
        }
    }

    pub fn reader(&self) -> &Rc<MetadataReader> {
        &self.reader
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn assembly_name(&self) -> &str {
        self.reader.assembly_name()
    }

    /// A handle to the type `full_name` (``Ns.Name`N``) of this module.
    pub fn runtime_type(&self, full_name: impl Into<String>) -> RuntimeType {
        RuntimeType::new(self.clone(), full_name)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("assembly", &self.reader.assembly_name())
            .field("location", &self.location)
            .finish()
    }
}

/// A type as seen by the runtime: a module plus a metadata name, optionally
/// instantiated and optionally used as an array.
#[derive(Debug, Clone)]
pub struct RuntimeType {
    module: LoadedModule,
    full_name: String,
    generic_arguments: Vec<RuntimeType>,
    array: Option<ArraySpecification>,
}

impl RuntimeType {
    pub fn new(module: LoadedModule, full_name: impl Into<String>) -> Self {
        Self {
            module,
            full_name: full_name.into(),
            generic_arguments: Vec::new(),
            array: None,
        }
    }

    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<RuntimeType>) -> Self {
        self.generic_arguments = arguments;
        self
    }

    #[must_use]
    pub fn with_array(mut self, array: ArraySpecification) -> Self {
        self.array = Some(array);
        self
    }

    pub fn module(&self) -> &LoadedModule {
        &self.module
    }

    /// Metadata name, arity marker included.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn generic_arguments(&self) -> &[RuntimeType] {
        &self.generic_arguments
    }

    pub fn array(&self) -> Option<&ArraySpecification> {
        self.array.as_ref()
    }

    /// `(namespace, raw name)` split at the last dot.
    pub fn namespace_and_name(&self) -> (&str, &str) {
        self.full_name.rsplit_once('.').unwrap_or(("", &self.full_name))
    }

    /// The definition row in the owning module, if there is one.
    pub fn definition(&self) -> Option<TypeDefinitionHandle> {
        let (namespace, name) = self.namespace_and_name();
        self.module.reader().find_type_definition(namespace, name)
    }
}
