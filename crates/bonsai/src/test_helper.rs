use std::sync::Arc;

use crate::config::SerializerOptions;
use crate::context::Context;
use crate::module::{Dependency, Module, ModuleId, OutputUnit, ResolveType};
use crate::module_graph::ModuleGraph;
use crate::serializer::SerializerParams;

pub fn test_context() -> Arc<Context> {
    Arc::new(Context::new())
}

pub fn js_module(id: &str, code: &str, is_entry: bool) -> Module {
    Module::new(ModuleId::new(id), is_entry, vec![OutputUnit::new(code)])
}

/// Wire a resolved graph by hand: edges are (from, to, source specifier).
pub fn build_graph(modules: Vec<Module>, edges: &[(&str, &str, &str)]) -> ModuleGraph {
    let mut graph = ModuleGraph::new();
    for module in modules {
        graph.add_module(module);
    }
    for (order, (from, to, source)) in edges.iter().enumerate() {
        graph.add_dependency(
            &ModuleId::new(*from),
            &ModuleId::new(*to),
            Dependency {
                source: source.to_string(),
                resolve_type: ResolveType::Import,
                order,
            },
        );
    }
    graph
}

pub fn test_params(entry: &str, graph: ModuleGraph) -> SerializerParams {
    SerializerParams {
        entry_point: ModuleId::new(entry),
        prepend: vec![],
        graph,
        options: Arc::new(SerializerOptions::new("/project", "/project")),
    }
}

/// Re-emit a module's current tree; falls back to the stored code when the
/// tree was never parsed.
pub fn emitted_code(graph: &ModuleGraph, id: &str, context: &Arc<Context>) -> String {
    let module = graph
        .get_module(&ModuleId::new(id))
        .unwrap_or_else(|| panic!("module {} not in graph", id));
    let unit = module.outputs.first().unwrap();
    match &unit.ast {
        Some(ast) => ast.generate(context).unwrap().code,
        None => unit.code.clone(),
    }
}
