//! Reference sites: where one declaration mentions another.

use serde::{Deserialize, Serialize};

use super::declaration::DeclId;
use super::predefined::PredefinedType;
use crate::graph::DeclarationGraph;

/// Array shape at a use site, outermost rank first as written in C#.
///
/// `int[]` is `[1]`, `int[,]` is `[2]`, `int[][]` is `[1, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArraySpecification {
    pub ranks: Vec<u32>,
}

impl ArraySpecification {
    pub fn new(rank: u32) -> Self {
        Self { ranks: vec![rank] }
    }

    /// Append a rank written after the existing ones.
    pub fn push_rank(spec: Option<Self>, rank: u32) -> Self {
        let mut spec = spec.unwrap_or_default();
        spec.ranks.push(rank);
        spec
    }

    /// Insert a rank written before the existing ones.
    pub fn wrap_rank(spec: Option<Self>, rank: u32) -> Self {
        let mut spec = spec.unwrap_or_default();
        spec.ranks.insert(0, rank);
        spec
    }

    fn suffix(&self) -> String {
        let mut out = String::new();
        for rank in &self.ranks {
            out.push('[');
            for _ in 1..*rank {
                out.push(',');
            }
            out.push(']');
        }
        out
    }
}

/// Which declaration owns a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericParameterOwner {
    Type,
    Method,
}

/// A resolved type reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationUse {
    /// A named declaration in the graph, possibly instantiated.
    Generic {
        declaration: DeclId,
        generic_arguments: Vec<DeclarationUse>,
        array: Option<ArraySpecification>,
    },
    /// A builtin type. Terminal: never looked up, never loaded.
    Predefined {
        ty: PredefinedType,
        array: Option<ArraySpecification>,
    },
    /// A generic parameter of the enclosing type or method (`T`).
    GenericParameter {
        name: String,
        position: usize,
        owner: GenericParameterOwner,
        array: Option<ArraySpecification>,
    },
}

impl DeclarationUse {
    pub fn generic(declaration: DeclId) -> Self {
        DeclarationUse::Generic {
            declaration,
            generic_arguments: Vec::new(),
            array: None,
        }
    }

    pub fn predefined(ty: PredefinedType) -> Self {
        DeclarationUse::Predefined { ty, array: None }
    }

    pub fn array_specification(&self) -> Option<&ArraySpecification> {
        match self {
            DeclarationUse::Generic { array, .. }
            | DeclarationUse::Predefined { array, .. }
            | DeclarationUse::GenericParameter { array, .. } => array.as_ref(),
        }
    }

    /// Generic arguments bound at this site; empty for everything but instantiations.
    pub fn generic_arguments(&self) -> &[DeclarationUse] {
        match self {
            DeclarationUse::Generic {
                generic_arguments, ..
            } => generic_arguments,
            _ => &[],
        }
    }

    /// The referenced graph node, if this site points into the graph.
    pub fn declaration(&self) -> Option<DeclId> {
        match self {
            DeclarationUse::Generic { declaration, .. } => Some(*declaration),
            _ => None,
        }
    }

    pub fn is_predefined(&self) -> bool {
        matches!(self, DeclarationUse::Predefined { .. })
    }

    #[must_use]
    pub fn with_array(mut self, spec: Option<ArraySpecification>) -> Self {
        match &mut self {
            DeclarationUse::Generic { array, .. }
            | DeclarationUse::Predefined { array, .. }
            | DeclarationUse::GenericParameter { array, .. } => *array = spec,
        }
        self
    }

    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<DeclarationUse>) -> Self {
        if let DeclarationUse::Generic {
            generic_arguments, ..
        } = &mut self
        {
            *generic_arguments = arguments;
        }
        self
    }

    /// Simple name of the referenced type, without arguments or array shape.
    pub fn name<'g>(&'g self, graph: &'g DeclarationGraph) -> &'g str {
        match self {
            DeclarationUse::Generic { declaration, .. } => graph.get(*declaration).name(),
            DeclarationUse::Predefined { ty, .. } => ty.keyword(),
            DeclarationUse::GenericParameter { name, .. } => name,
        }
    }

    /// Fully qualified name of the referenced type. Predefined types use their keyword.
    pub fn full_name<'g>(&'g self, graph: &'g DeclarationGraph) -> &'g str {
        match self {
            DeclarationUse::Generic { declaration, .. } => graph.get(*declaration).full_name(),
            _ => self.name(graph),
        }
    }

    /// C# rendering: `Dictionary<string, List<T>>[]`.
    pub fn display(&self, graph: &DeclarationGraph) -> String {
        let mut out = self.name(graph).to_string();
        let arguments = self.generic_arguments();
        if !arguments.is_empty() {
            out.push('<');
            for (i, argument) in arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&argument.display(graph));
            }
            out.push('>');
        }
        if let Some(spec) = self.array_specification() {
            out.push_str(&spec.suffix());
        }
        out
    }

    /// Pair the referenced declaration's generic parameters with the arguments
    /// bound here, by position. Empty until the referenced node is loaded.
    pub fn bindings<'a>(&'a self, graph: &'a DeclarationGraph) -> Vec<(&'a str, &'a DeclarationUse)> {
        let Some(id) = self.declaration() else {
            return Vec::new();
        };
        graph
            .get(id)
            .generic_parameters()
            .iter()
            .map(|p| p.name.as_str())
            .zip(self.generic_arguments())
            .collect()
    }

    /// Every graph node referenced by this site, the site itself first.
    pub fn referenced_declarations(&self) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<DeclId>) {
        if let DeclarationUse::Generic {
            declaration,
            generic_arguments,
            ..
        } = self
        {
            out.push(*declaration);
            for argument in generic_arguments {
                argument.collect_references(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_suffix() {
        let spec = ArraySpecification::push_rank(Some(ArraySpecification::new(2)), 1);
        assert_eq!(spec.ranks, vec![2, 1]);
        assert_eq!(spec.suffix(), "[,][]");
        let wrapped = ArraySpecification::wrap_rank(Some(ArraySpecification::new(1)), 3);
        assert_eq!(wrapped.ranks, vec![3, 1]);
    }

    #[test]
    fn test_predefined_display() {
        let graph = DeclarationGraph::new();
        let use_site = DeclarationUse::predefined(PredefinedType::Int)
            .with_array(Some(ArraySpecification::new(1)));
        assert_eq!(use_site.display(&graph), "int[]");
        assert!(use_site.generic_arguments().is_empty());
        assert!(use_site.declaration().is_none());
        assert!(use_site.bindings(&graph).is_empty());
    }

    #[test]
    fn test_generic_parameter_display() {
        let graph = DeclarationGraph::new();
        let use_site = DeclarationUse::GenericParameter {
            name: "TItem".to_string(),
            position: 0,
            owner: GenericParameterOwner::Method,
            array: Some(ArraySpecification::new(2)),
        };
        assert_eq!(use_site.display(&graph), "TItem[,]");
        assert_eq!(use_site.full_name(&graph), "TItem");
    }

    #[test]
    fn test_with_generic_arguments_ignores_terminals() {
        let use_site = DeclarationUse::predefined(PredefinedType::String)
            .with_generic_arguments(vec![DeclarationUse::predefined(PredefinedType::Int)]);
        assert!(use_site.generic_arguments().is_empty());
    }
}
