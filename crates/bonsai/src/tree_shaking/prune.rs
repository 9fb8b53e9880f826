use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexSet;
use swc_core::ecma::visit::VisitMutWith;
use tracing::{debug, warn};

use crate::context::Context;
use crate::module::{ExportOpacity, ImportSpecifierKind, ModuleId};
use crate::module_graph::ModuleGraph;
use crate::tree_shaking::collect;
use crate::tree_shaking::collectors::body_used_idents;
use crate::tree_shaking::marker::UnusedMarker;
use crate::tree_shaking::remove_unused::{UnusedExportRemover, UnusedImportRemover};

/// Hard ceiling on fixpoint iterations. Each productive pass strictly shrinks
/// the edge count, so a real graph converges long before this; hitting it
/// leaves the graph valid but under-pruned.
pub const MAX_PASSES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMode {
    /// Strip dead exports/imports and detach edges.
    Remove,
    /// Only mark dead declarations with `#__UNUSED__` comments.
    Annotate,
}

/// The liveness & pruning engine: repeated export-then-import passes over the
/// graph until no edge is detached. The usage cache is a pure function of the
/// current trees and is re-derived at the start of every pass.
pub fn shake(graph: &mut ModuleGraph, context: &Arc<Context>, mode: PruneMode) -> Result<()> {
    if mode == PruneMode::Annotate {
        collect::collect_usage(graph, context)?;
        for id in graph.get_module_ids() {
            annotate_module(graph, &id, context)?;
        }
        return Ok(());
    }

    let mut dirty: IndexSet<ModuleId> = graph.get_module_ids().into_iter().collect();
    let mut passes = 0;

    while !dirty.is_empty() {
        passes += 1;
        if passes > MAX_PASSES {
            warn!(
                "tree shaking stopped after {} passes without reaching a fixpoint",
                MAX_PASSES
            );
            break;
        }
        debug!("tree shaking pass {} over {} modules", passes, dirty.len());

        collect::collect_usage(graph, context)?;

        // modules whose trees shrank this pass; their import records may
        // have shrunk with them, so their dependencies get re-examined
        let mut changed: IndexSet<ModuleId> = IndexSet::new();
        for id in dirty.iter() {
            if !graph.has_module(id) {
                continue;
            }
            if prune_module_exports(graph, id)? {
                changed.insert(id.clone());
            }
        }

        let mut next_dirty = IndexSet::new();
        for id in dirty.iter() {
            if !graph.has_module(id) {
                continue;
            }
            let (import_changed, affected) = prune_module_imports(graph, id)?;
            if import_changed {
                changed.insert(id.clone());
            }
            next_dirty.extend(affected);
        }

        for id in changed {
            if !graph.has_module(&id) {
                continue;
            }
            next_dirty.extend(
                graph
                    .get_dependencies(&id)
                    .into_iter()
                    .map(|(target, _)| target.clone()),
            );
        }
        dirty = next_dirty;
    }
    Ok(())
}

/// Which of this module's export names some surviving importer still uses.
/// `None` means every export must be kept: entry points, modules nobody
/// imports (prepended code), or a legacy/namespace edge in between.
fn live_export_names(graph: &ModuleGraph, id: &ModuleId) -> Option<HashSet<String>> {
    if graph.is_entry(id) {
        return None;
    }
    let dependents = graph.get_dependents(id);
    if dependents.is_empty() {
        return None;
    }

    let mut live = HashSet::new();
    for (dependent_id, _) in dependents {
        let dependent = graph.get_module(dependent_id)?;
        for unit in &dependent.outputs {
            let usage = unit.usage.as_ref()?;
            for record in usage.imports.iter().filter(|r| &r.resolved_id == id) {
                if record.legacy {
                    return None;
                }
                for specifier in &record.specifiers {
                    match specifier.kind {
                        ImportSpecifierKind::Namespace => return None,
                        ImportSpecifierKind::Default => {
                            live.insert("default".to_string());
                        }
                        ImportSpecifierKind::Named => {
                            live.insert(
                                specifier
                                    .imported
                                    .clone()
                                    .unwrap_or_else(|| specifier.local.clone()),
                            );
                        }
                    }
                }
            }
        }
    }
    Some(live)
}

fn opacity_of(graph: &ModuleGraph, id: &ModuleId) -> ExportOpacity {
    let Some(module) = graph.get_module(id) else {
        return ExportOpacity::Unknown;
    };
    let mut opacity = ExportOpacity::Transparent;
    for unit in &module.outputs {
        match unit.usage.as_ref().map(|usage| usage.opacity) {
            Some(ExportOpacity::Opaque) => return ExportOpacity::Opaque,
            Some(ExportOpacity::Unknown) | None => opacity = ExportOpacity::Unknown,
            Some(ExportOpacity::Transparent) => {}
        }
    }
    opacity
}

fn prune_module_exports(graph: &mut ModuleGraph, id: &ModuleId) -> Result<bool> {
    let opacity = opacity_of(graph, id);
    if opacity.is_opaque() {
        if opacity == ExportOpacity::Unknown {
            warn!(
                "exports of {} are mutated through an unrecognized CommonJS shape; skipping export pruning",
                id.id
            );
        }
        return Ok(false);
    }
    let Some(live) = live_export_names(graph, id) else {
        return Ok(false);
    };

    let module = graph.get_module_mut(id).unwrap();
    let mut removed = 0;
    for unit in &mut module.outputs {
        let Some(ast) = unit.ast.as_mut() else {
            continue;
        };
        let locally_used = body_used_idents(&ast.ast);
        let mut remover = UnusedExportRemover::new(&live, &locally_used);
        ast.ast.visit_mut_with(&mut remover);
        removed += remover.removed;
    }
    debug!(
        "export pruning done for {} (live: {:?}, removed: {})",
        id.id, live, removed
    );
    Ok(removed > 0)
}

/// Strip unused import bindings, then detach every outgoing edge no surviving
/// record references. Returns whether the tree changed plus the modules whose
/// liveness inputs changed.
fn prune_module_imports(
    graph: &mut ModuleGraph,
    id: &ModuleId,
) -> Result<(bool, Vec<ModuleId>)> {
    let deps = collect::dependency_snapshot(graph, id);

    let module = graph.get_module_mut(id).unwrap();
    let mut still_referenced: HashSet<ModuleId> = HashSet::new();
    let mut analyzed_any = false;
    let mut removed = 0;
    for unit in &mut module.outputs {
        let Some(ast) = unit.ast.as_mut() else {
            continue;
        };
        let used = body_used_idents(&ast.ast);
        let mut remover = UnusedImportRemover::new(&used);
        ast.ast.visit_mut_with(&mut remover);
        removed += remover.removed;

        // the usage cache went stale the moment the tree mutated; re-derive
        // it before reading edges off it
        let usage = collect::analyze_unit(&ast.ast, id, &deps)?;
        for record in &usage.imports {
            still_referenced.insert(record.resolved_id.clone());
        }
        unit.usage = Some(usage);
        analyzed_any = true;
    }
    if !analyzed_any {
        return Ok((false, vec![]));
    }

    let targets: IndexSet<ModuleId> = deps.into_iter().map(|(_, target)| target).collect();
    let mut affected = vec![];
    for target in targets {
        // a cycle collapse may have taken this module down with a target
        if !graph.has_module(id) {
            break;
        }
        if still_referenced.contains(&target) || !graph.has_module(&target) {
            continue;
        }
        graph.remove_dependency(id, &target);
        debug!("detached edge {} -> {}", id.id, target.id);
        if graph.get_dependents(&target).is_empty() && !graph.is_entry(&target) {
            affected.extend(graph.remove_unreferenced_module(&target));
        } else {
            affected.push(target);
        }
    }
    Ok((removed > 0, affected))
}

fn annotate_module(graph: &mut ModuleGraph, id: &ModuleId, context: &Arc<Context>) -> Result<()> {
    let live = if opacity_of(graph, id).is_opaque() {
        None
    } else {
        live_export_names(graph, id)
    };

    let module = graph.get_module_mut(id).unwrap();
    for unit in &mut module.outputs {
        let Some(ast) = unit.ast.as_mut() else {
            continue;
        };
        let used = body_used_idents(&ast.ast);
        let mut comments = context.comments.write().unwrap();
        let mut marker = UnusedMarker::new(live.as_ref(), &used, &mut comments);
        ast.ast.visit_mut_with(&mut marker);
    }
    Ok(())
}
