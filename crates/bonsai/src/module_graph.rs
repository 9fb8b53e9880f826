use std::collections::{HashMap, HashSet};
use std::fmt;

use anyhow::{anyhow, Result};
use petgraph::graph::{DefaultIx, NodeIndex};
use petgraph::prelude::EdgeRef;
use petgraph::stable_graph::{StableDiGraph, WalkNeighbors};
use petgraph::visit::IntoEdgeReferences;
use petgraph::Direction;
use tracing::debug;

use crate::error::SerializeError;
use crate::module::{Dependency, Module, ModuleId};

/// The resolved dependency graph handed over by the upstream resolver.
/// Edges are added upstream only; this crate's pruning engine is the sole
/// remover of edges and nodes.
pub struct ModuleGraph {
    id_index_map: HashMap<ModuleId, NodeIndex<DefaultIx>>,
    pub graph: StableDiGraph<Module, Dependency>,
    entries: HashSet<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self {
            id_index_map: HashMap::new(),
            graph: StableDiGraph::new(),
            entries: HashSet::new(),
        }
    }

    pub fn add_module(&mut self, module: Module) {
        let id_for_map = module.id.clone();
        let id_for_entry = module.id.clone();
        let is_entry = module.is_entry;
        let idx = self.graph.add_node(module);
        self.id_index_map.insert(id_for_map, idx);
        if is_entry {
            self.entries.insert(id_for_entry);
        }
    }

    pub fn has_module(&self, module_id: &ModuleId) -> bool {
        self.id_index_map.contains_key(module_id)
    }

    pub fn is_entry(&self, module_id: &ModuleId) -> bool {
        self.entries.contains(module_id)
    }

    pub fn get_module(&self, module_id: &ModuleId) -> Option<&Module> {
        self.id_index_map
            .get(module_id)
            .and_then(|i| self.graph.node_weight(*i))
    }

    pub fn get_module_mut(&mut self, module_id: &ModuleId) -> Option<&mut Module> {
        self.id_index_map
            .get(module_id)
            .and_then(|i| self.graph.node_weight_mut(*i))
    }

    pub fn get_modules(&self) -> Vec<&Module> {
        self.graph.node_weights().collect()
    }

    pub fn get_module_ids(&self) -> Vec<ModuleId> {
        let mut ids = self
            .graph
            .node_weights()
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn remove_module(&mut self, module_id: &ModuleId) -> Module {
        let index = self
            .id_index_map
            .remove(module_id)
            .unwrap_or_else(|| panic!("module_id {:?} not found in the module graph", module_id));
        self.graph.remove_node(index).unwrap()
    }

    pub fn add_dependency(&mut self, from: &ModuleId, to: &ModuleId, edge: Dependency) {
        let from = self
            .id_index_map
            .get(from)
            .unwrap_or_else(|| panic!("module_id {:?} not found in the module graph", from));
        let to = self
            .id_index_map
            .get(to)
            .unwrap_or_else(|| panic!("module_id {:?} not found in the module graph", to));
        self.graph.update_edge(*from, *to, edge);
    }

    pub fn remove_dependency(&mut self, from: &ModuleId, to: &ModuleId) {
        let from_index = self.id_index_map.get(from).unwrap_or_else(|| {
            panic!(
                r#"from node "{}" does not exist in the module graph when remove edge"#,
                from.id
            )
        });

        let to_index = self.id_index_map.get(to).unwrap_or_else(|| {
            panic!(
                r#"to node "{}" does not exist in the module graph when remove edge"#,
                to.id
            )
        });

        let edge = self
            .graph
            .find_edge(*from_index, *to_index)
            .unwrap_or_else(|| {
                panic!(
                    r#"edge "{}" -> "{}" does not exist in the module graph when remove edge"#,
                    from.id, to.id
                )
            });

        self.graph.remove_edge(edge);
    }

    fn get_edges(&self, module_id: &ModuleId, direction: Direction) -> WalkNeighbors<u32> {
        let i = self
            .id_index_map
            .get(module_id)
            .unwrap_or_else(|| panic!("module_id {:?} not found in the module graph", module_id));
        self.graph.neighbors_directed(*i, direction).detach()
    }

    /// Outgoing edges, in the resolver's import order.
    pub fn get_dependencies(&self, module_id: &ModuleId) -> Vec<(&ModuleId, &Dependency)> {
        let mut edges = self.get_edges(module_id, Direction::Outgoing);
        let mut deps: Vec<(&ModuleId, &Dependency)> = vec![];
        while let Some((edge_index, node_index)) = edges.next(&self.graph) {
            let dependency = self.graph.edge_weight(edge_index).unwrap();
            let module = self.graph.node_weight(node_index).unwrap();
            deps.push((&module.id, dependency));
        }
        deps.sort_by_key(|(_, dep)| dep.order);
        deps
    }

    /// Incoming edges: who imports this module.
    pub fn get_dependents(&self, module_id: &ModuleId) -> Vec<(&ModuleId, &Dependency)> {
        let mut edges = self.get_edges(module_id, Direction::Incoming);
        let mut dependents = vec![];
        while let Some((edge_index, node_index)) = edges.next(&self.graph) {
            let dependency = self.graph.edge_weight(edge_index).unwrap();
            let module = self.graph.node_weight(node_index).unwrap();
            dependents.push((&module.id, dependency));
        }
        dependents
    }

    /// Match an import specifier string against the module's own outgoing
    /// edges. The graph is resolver-consistent, so a miss is fatal.
    pub fn get_dependency_id_by_source(
        &self,
        module_id: &ModuleId,
        source: &str,
    ) -> Result<ModuleId> {
        self.get_dependencies(module_id)
            .into_iter()
            .find(|(_, dep)| dep.source == source)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| {
                anyhow!(SerializeError::UnresolvedSpecifier {
                    specifier: source.to_string(),
                    module: module_id.id.clone(),
                })
            })
    }

    /// Remove an unreferenced module together with its outgoing edges, then
    /// collect any dependencies that become unreferenced themselves. Returns
    /// every surviving module whose incoming edge set changed.
    pub fn remove_unreferenced_module(&mut self, module_id: &ModuleId) -> Vec<ModuleId> {
        let mut affected = vec![];
        let targets = self
            .get_dependencies(module_id)
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();

        debug!("remove unreferenced module {}", module_id.id);
        self.remove_module(module_id);

        for target in targets {
            if !self.has_module(&target) {
                continue;
            }
            if self.get_dependents(&target).is_empty() && !self.is_entry(&target) {
                affected.extend(self.remove_unreferenced_module(&target));
            } else {
                affected.push(target);
            }
        }
        affected
    }

    /// Total edge count; each fixpoint iteration either shrinks this or
    /// changes nothing.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl fmt::Display for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut nodes = self
            .graph
            .node_weights()
            .map(|node| &node.id.id)
            .collect::<Vec<_>>();
        let mut references = self
            .graph
            .edge_references()
            .map(|edge| {
                let source = &self.graph[edge.source()].id.id;
                let target = &self.graph[edge.target()].id.id;
                format!("{} -> {}", source, target)
            })
            .collect::<Vec<_>>();
        nodes.sort_by_key(|id| id.to_string());
        references.sort_by_key(|id| id.to_string());
        write!(
            f,
            "graph\n nodes:{:?} \n references:{:?}",
            &nodes, &references
        )
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleGraph;
    use crate::module::{Dependency, Module, ModuleId, ResolveType};

    fn dep(source: &str, order: usize) -> Dependency {
        Dependency {
            source: source.to_string(),
            resolve_type: ResolveType::Import,
            order,
        }
    }

    fn graph_with_chain() -> ModuleGraph {
        // /a -> /b -> /c
        let mut graph = ModuleGraph::new();
        graph.add_module(Module::new(ModuleId::new("/a"), true, vec![]));
        graph.add_module(Module::new(ModuleId::new("/b"), false, vec![]));
        graph.add_module(Module::new(ModuleId::new("/c"), false, vec![]));
        graph.add_dependency(&ModuleId::new("/a"), &ModuleId::new("/b"), dep("./b", 0));
        graph.add_dependency(&ModuleId::new("/b"), &ModuleId::new("/c"), dep("./c", 0));
        graph
    }

    #[test]
    fn test_dependency_lookup_by_source() {
        let graph = graph_with_chain();
        let id = graph
            .get_dependency_id_by_source(&ModuleId::new("/a"), "./b")
            .unwrap();
        assert_eq!(id, ModuleId::new("/b"));

        let err = graph
            .get_dependency_id_by_source(&ModuleId::new("/a"), "./missing")
            .unwrap_err();
        assert!(err.to_string().contains("./missing"));
        assert!(err.to_string().contains("/a"));
    }

    #[test]
    fn test_dependents_track_incoming_edges() {
        let graph = graph_with_chain();
        let dependents = graph.get_dependents(&ModuleId::new("/b"));
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].0, &ModuleId::new("/a"));
    }

    #[test]
    fn test_remove_unreferenced_module_cascades() {
        let mut graph = graph_with_chain();
        graph.remove_dependency(&ModuleId::new("/a"), &ModuleId::new("/b"));
        let affected = graph.remove_unreferenced_module(&ModuleId::new("/b"));
        // /c lost its only dependent and went with it
        assert!(affected.is_empty());
        assert!(!graph.has_module(&ModuleId::new("/b")));
        assert!(!graph.has_module(&ModuleId::new("/c")));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_cascade_stops_at_entries() {
        let mut graph = graph_with_chain();
        graph.entries.insert(ModuleId::new("/c"));
        graph.remove_dependency(&ModuleId::new("/a"), &ModuleId::new("/b"));
        graph.remove_unreferenced_module(&ModuleId::new("/b"));
        assert!(graph.has_module(&ModuleId::new("/c")));
    }
}
