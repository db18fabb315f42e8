//! # declgraph
//!
//! A lazily loaded graph of C# type declarations, built from parsed source
//! and from compiled-module metadata, for code generators that need the
//! shape of the types they emit against.
//!
//! ## Key Features
//!
//! - **One shape, two origins**: source and metadata declarations load into the same model
//! - **Lazy**: nodes are registered unloaded and fill in on first request
//! - **Cycle tolerant**: loading is idempotent and re-entrant
//! - **Resolver**: namespaces, using directives, aliases, builtins and external modules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use declgraph::{load_project, ModelConfig};
//! use std::path::PathBuf;
//!
//! let mut resolver = load_project(&[PathBuf::from("src")], ModelConfig::default())?;
//! let widget = resolver.graph().find("Sample.Widget")[0];
//! resolver.deep_load(widget)?;
//! for property in resolver.graph().get(widget).properties() {
//!     println!("{} {}", property.property_type.display(resolver.graph()), property.name);
//! }
//! # Ok::<(), declgraph::ModelError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod graph;
mod loader;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod project;
pub mod resolver;

// Re-exports for convenience
pub use config::{LoadPolicy, ModelConfig};
pub use error::{ModelError, Result};
pub use factory::DeclarationFactory;

// Graph re-exports
pub use graph::{DeclarationGraph, DeclarationSummary, EdgeKind, GraphStats, SearchResult};
pub use model::{
    ArraySpecification, Attribute, DeclId, Declaration, DeclarationKind, DeclarationUse, GenericParameter, Member,
    MethodDeclaration, Parameter, PredefinedType, PropertyDeclaration, SyntaxHandle,
};

// Inputs
pub use metadata::{LoadedModule, MetadataReader, ModuleBuilder, RuntimeType};
pub use parser::{SourceUnit, TypeReference};
pub use project::{collect_sources, load_project, parse_sources};
pub use resolver::{DeclarationResolver, ResolveScope};
