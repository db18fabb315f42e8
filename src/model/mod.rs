//! The declaration model: nodes, members, use-sites and their syntax handles.

pub mod declaration;
pub mod member;
pub mod predefined;
pub mod side_data;
pub mod syntax_handle;
pub mod use_site;

pub use declaration::{
    full_name_of, DeclId, Declaration, DeclarationKind, MetadataSource, Provenance,
};
pub(crate) use declaration::DeclarationHeader;
pub use member::{
    Attribute, GenericParameter, Member, MethodDeclaration, Parameter, PropertyDeclaration,
};
pub use predefined::PredefinedType;
pub use side_data::SideData;
pub use syntax_handle::SyntaxHandle;
pub use use_site::{ArraySpecification, DeclarationUse, GenericParameterOwner};
