//! C# source parsing with tree-sitter.
//!
//! [`SourceUnit`] finds the type declarations of a file; [`type_reference`]
//! turns type syntax into the references the resolver consumes.

pub mod language;
pub mod source_unit;
pub mod type_syntax;

pub use language::{is_source_file, language, SourceTree};
pub use source_unit::{SourceUnit, SyntaxDeclaration};
pub use type_syntax::{type_reference, TypeReference};
