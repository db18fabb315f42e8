//! Declaration graph: the owning store of one analysis run and its read-only queries.

pub mod engine;
pub mod types;

pub use engine::DeclarationGraph;
pub use types::{
    DeclarationSummary, DependencyInfo, EdgeData, EdgeKind, GraphStats, MemberSummary, SearchResult,
};
