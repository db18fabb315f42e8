//! The context a reference is resolved in.

use crate::model::Declaration;

/// Where a reference was written: the requesting declaration's namespace,
/// using directives and origin, plus the generic parameters in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveScope {
    /// Full name of the requesting declaration, for diagnostics.
    pub requester: String,
    pub namespace: String,
    /// In precedence order. Alias directives read `Alias = Target`.
    pub using_directives: Vec<String>,
    pub location: String,
    pub type_parameters: Vec<String>,
    pub method_parameters: Vec<String>,
}

impl ResolveScope {
    /// Scope of code written inside `declaration`.
    pub fn of(declaration: &Declaration) -> Self {
        Self {
            requester: declaration.full_name().to_string(),
            namespace: declaration.namespace().to_string(),
            using_directives: declaration.using_directives().to_vec(),
            location: declaration.location().to_string(),
            type_parameters: declaration
                .generic_parameters()
                .iter()
                .map(|p| p.name.clone())
                .collect(),
            method_parameters: Vec::new(),
        }
    }

    /// A scope with no namespace context, for fully qualified names.
    pub fn global(requester: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            location: location.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_using_directives(mut self, directives: Vec<String>) -> Self {
        self.using_directives = directives;
        self
    }

    #[must_use]
    pub fn with_type_parameters(mut self, names: Vec<String>) -> Self {
        self.type_parameters = names;
        self
    }

    #[must_use]
    pub fn with_method_parameters(mut self, names: Vec<String>) -> Self {
        self.method_parameters = names;
        self
    }

    /// Enclosing namespaces, innermost first (`A.B.C`, `A.B`, `A`).
    pub(crate) fn enclosing_namespaces(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.namespace.as_str();
        while !current.is_empty() {
            out.push(current);
            current = current.rsplit_once('.').map(|(outer, _)| outer).unwrap_or("");
        }
        out
    }

    /// A scope for resolving an alias target: no namespace or directives of its own.
    pub(crate) fn for_alias_target(&self) -> Self {
        Self {
            requester: self.requester.clone(),
            location: self.location.clone(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_namespaces_innermost_first() {
        let scope = ResolveScope {
            namespace: "Sample.Core.Shapes".to_string(),
            ..ResolveScope::default()
        };
        assert_eq!(
            scope.enclosing_namespaces(),
            vec!["Sample.Core.Shapes", "Sample.Core", "Sample"]
        );
        assert!(ResolveScope::global("X", "X.cs").enclosing_namespaces().is_empty());
    }

    #[test]
    fn test_alias_target_scope_drops_context() {
        let scope = ResolveScope {
            requester: "Sample.Widget".to_string(),
            namespace: "Sample".to_string(),
            using_directives: vec!["W = Sample.Widget".to_string()],
            location: "Widget.cs".to_string(),
            type_parameters: vec!["T".to_string()],
            method_parameters: Vec::new(),
        };
        let target = scope.for_alias_target();
        assert_eq!(target.requester, "Sample.Widget");
        assert_eq!(target.location, "Widget.cs");
        assert!(target.using_directives.is_empty());
        assert!(target.type_parameters.is_empty());
    }
}
