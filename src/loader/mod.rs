//! Loaders: fill an unloaded declaration from its syntax or its metadata row.
//!
//! Both publish in the same order (generic parameters, constraints, base
//! types, members, attributes) so that a declaration re-entered during its
//! own load sees whatever has been published so far.

pub(crate) mod metadata;
pub(crate) mod syntax;
