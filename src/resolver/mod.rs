//! The resolver: maps references to declaration-uses and drives loading.
//!
//! One [`DeclarationResolver`] owns the graph of an analysis run together
//! with the modules and factory needed to grow it. Loading is depth-first
//! on a single thread: a loader resolves references, resolution may load
//! other declarations, and the `loaded` flag stops the recursion on cycles.

mod names;
pub mod reference;
mod tokens;

pub use reference::ResolveScope;

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use tracing::{debug, info};

use crate::config::{LoadPolicy, ModelConfig};
use crate::error::Result;
use crate::factory::DeclarationFactory;
use crate::graph::DeclarationGraph;
use crate::loader;
use crate::metadata::{LoadedModule, MetadataReader};
use crate::model::{DeclId, DeclarationUse, Provenance};
use crate::parser::SourceUnit;

pub struct DeclarationResolver {
    graph: DeclarationGraph,
    modules: Vec<LoadedModule>,
    factory: DeclarationFactory,
    config: ModelConfig,
}

impl Default for DeclarationResolver {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl DeclarationResolver {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            graph: DeclarationGraph::new(),
            modules: Vec::new(),
            factory: DeclarationFactory::from_config(&config),
            config,
        }
    }

    pub fn graph(&self) -> &DeclarationGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut DeclarationGraph {
        &mut self.graph
    }

    pub fn factory(&self) -> &DeclarationFactory {
        &self.factory
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    // ─── Inputs ─────────────────────────────────────────────────

    /// Make a module available for on-demand resolution. Its types are
    /// only materialized when something refers to them.
    pub fn add_module(&mut self, module: LoadedModule) {
        debug!(assembly = module.assembly_name(), location = module.location(), "adding module");
        self.modules.push(module);
    }

    /// Add a module and register an unloaded node for each of its type definitions.
    pub fn import_module(&mut self, module: LoadedModule) -> Result<Vec<DeclId>> {
        let reader = Rc::clone(module.reader());
        let location = module.location().to_string();
        self.add_module(module);
        reader
            .type_definitions()
            .map(|handle| self.definition(&reader, &location, handle))
            .collect()
    }

    /// Register an unloaded node for every declaration of a parsed file.
    pub fn add_source_unit(&mut self, unit: &SourceUnit) -> Result<Vec<DeclId>> {
        let mut ids = Vec::with_capacity(unit.declarations().len());
        for declaration in unit.declarations() {
            let created = self.factory.create_from_syntax(declaration)?;
            ids.push(self.graph.add(created));
        }
        debug!(path = unit.path(), declarations = ids.len(), "added source unit");
        Ok(ids)
    }

    /// The loaded module defining `assembly`.
    pub(crate) fn module_for_assembly(&self, assembly: &str) -> Option<&LoadedModule> {
        self.modules.iter().find(|m| m.assembly_name() == assembly)
    }

    pub(crate) fn module_readers(&self) -> Vec<(Rc<MetadataReader>, String)> {
        self.modules
            .iter()
            .map(|m| (Rc::clone(m.reader()), m.location().to_string()))
            .collect()
    }

    // ─── Loading ────────────────────────────────────────────────

    /// Populate a declaration's generic parameters, base types, members and
    /// attributes. Idempotent: a loaded node, or one whose load is already in
    /// progress further up the stack, is returned as it is.
    pub fn load(&mut self, id: DeclId) -> Result<()> {
        let declaration = self.graph.get(id);
        if declaration.is_loaded() {
            return Ok(());
        }
        debug!(declaration = %declaration, location = declaration.location(), "loading");
        let provenance = declaration.provenance().clone();
        self.graph.get_mut(id).loaded = true;

        let outcome = match &provenance {
            Provenance::Syntax => loader::syntax::load(self, id),
            Provenance::Metadata(source) => loader::metadata::load(self, id, source),
        };
        if let Err(err) = outcome {
            let declaration = self.graph.get_mut(id);
            declaration.loaded = false;
            declaration.generic_parameters.clear();
            declaration.extends.clear();
            declaration.members.clear();
            declaration.attributes.clear();
            return Err(err);
        }

        self.graph.record_references(id);
        Ok(())
    }

    /// Load a node and everything reachable from it, breadth-first, stopping
    /// `max_load_depth` references away from `root` when a budget is set.
    /// Returns the number of declarations visited.
    pub fn deep_load(&mut self, root: DeclId) -> Result<usize> {
        let budget = self.config.max_load_depth;
        let mut visited: HashSet<DeclId> = HashSet::new();
        let mut queue: VecDeque<(DeclId, usize)> = VecDeque::from([(root, 0)]);

        while let Some((id, depth)) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            self.load(id)?;
            if budget.is_some_and(|max| depth >= max) {
                continue;
            }
            for (_, next) in self.graph.get(id).references() {
                if !visited.contains(&next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        debug!(root = %self.graph.get(root), visited = visited.len(), "deep load finished");
        Ok(visited.len())
    }

    /// Load every declaration registered so far.
    pub fn load_all(&mut self) -> Result<()> {
        let ids = self.graph.ids();
        for &id in &ids {
            self.load(id)?;
        }
        info!(declarations = ids.len(), total = self.graph.len(), "loaded all declarations");
        Ok(())
    }

    /// Attach a side-data payload to a declaration.
    pub fn set_data<T: std::any::Any>(&mut self, id: DeclId, value: T) -> Result<()> {
        self.graph.set_data(id, value)
    }

    /// Apply the load policy to a freshly resolved use-site.
    pub(crate) fn after_resolve(&mut self, use_site: &DeclarationUse) -> Result<()> {
        if self.config.load_policy == LoadPolicy::OnResolve {
            if let Some(id) = use_site.declaration() {
                self.load(id)?;
            }
        }
        Ok(())
    }

    pub(crate) fn skip_compiler_attributes(&self) -> bool {
        self.config.skip_compiler_attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::DeclarationKind;

    fn resolver_with(sources: &[(&str, &str)], config: ModelConfig) -> (DeclarationResolver, Vec<DeclId>) {
        let mut resolver = DeclarationResolver::new(config);
        let mut ids = Vec::new();
        for (path, text) in sources {
            let unit = SourceUnit::parse(*path, *text).unwrap();
            ids.extend(resolver.add_source_unit(&unit).unwrap());
        }
        (resolver, ids)
    }

    #[test]
    fn test_add_source_unit_registers_unloaded_nodes() {
        let (resolver, ids) = resolver_with(
            &[("Shapes.cs", "namespace Sample { interface IShape { } class Circle : IShape { } }")],
            ModelConfig::default(),
        );
        assert_eq!(ids.len(), 2);
        assert_eq!(resolver.graph().get(ids[0]).kind(), DeclarationKind::Interface);
        assert!(ids.iter().all(|&id| !resolver.graph().get(id).is_loaded()));
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let (mut resolver, ids) = resolver_with(
            &[("Shapes.cs", "namespace Sample { interface IShape { } class Circle : IShape { int Radius { get; } } }")],
            ModelConfig::default(),
        );
        let circle = ids[1];
        resolver.load(circle).unwrap();
        let edges = resolver.graph().stats().total_edges;
        let members = resolver.graph().get(circle).members().len();
        resolver.load(circle).unwrap();
        assert_eq!(resolver.graph().stats().total_edges, edges);
        assert_eq!(resolver.graph().get(circle).members().len(), members);
        assert_eq!(resolver.graph().get(circle).extends().len(), 1);
    }

    #[test]
    fn test_failed_load_is_rolled_back() {
        let (mut resolver, ids) = resolver_with(
            &[("Broken.cs", "namespace Sample { class Widget : IMissing { } }")],
            ModelConfig::default(),
        );
        let err = resolver.load(ids[0]).unwrap_err();
        match &err {
            ModelError::UnresolvedReference {
                reference,
                requester,
                location,
            } => {
                assert_eq!(reference, "IMissing");
                assert_eq!(requester, "Sample.Widget");
                assert_eq!(location, "Broken.cs");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
        assert!(!resolver.graph().get(ids[0]).is_loaded());
        assert!(resolver.load(ids[0]).is_err(), "the failure is reported again");
    }

    #[test]
    fn test_deep_load_respects_budget() {
        let source = "namespace Sample { class A : B { } class B : C { } class C { } }";
        let (mut resolver, ids) = resolver_with(&[("Chain.cs", source)], ModelConfig::default().with_max_load_depth(1));
        let visited = resolver.deep_load(ids[0]).unwrap();
        assert_eq!(visited, 2);
        assert!(resolver.graph().get(ids[1]).is_loaded());
        assert!(!resolver.graph().get(ids[2]).is_loaded(), "C is beyond the budget");

        let (mut unbounded, ids) = resolver_with(&[("Chain.cs", source)], ModelConfig::default());
        assert_eq!(unbounded.deep_load(ids[0]).unwrap(), 3);
        assert!(ids.iter().all(|&id| unbounded.graph().get(id).is_loaded()));
    }

    #[test]
    fn test_load_all_loads_registered_nodes() {
        let (mut resolver, ids) = resolver_with(
            &[("A.cs", "class A { }"), ("B.cs", "class B : A { }")],
            ModelConfig::default(),
        );
        resolver.load_all().unwrap();
        assert!(ids.iter().all(|&id| resolver.graph().get(id).is_loaded()));
        assert_eq!(resolver.graph().extended_by(ids[0]), vec![ids[1]]);
    }
}
