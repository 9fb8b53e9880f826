use std::sync::Arc;

use anyhow::{anyhow, Result};
use swc_core::common::collections::AHashSet;
use swc_core::common::sync::Lrc;
use swc_core::ecma::ast::{
    CallExpr, Callee, Decl, Expr, Id, Import, Lit, Module as SwcModule, ModuleDecl,
    ModuleExportName, ModuleItem,
};
use swc_core::ecma::utils::collect_decls;
use swc_core::ecma::visit::{Visit, VisitWith};

use crate::context::Context;
use crate::error::SerializeError;
use crate::module::{
    ExportRecord, ImportRecord, ImportSpecifierKind, ImportSpecifierRecord, ModuleId, ModuleUsage,
};
use crate::module_graph::ModuleGraph;
use crate::tree_shaking::collectors::DefinedIdentCollector;
use crate::tree_shaking::commonjs::detect_export_shape;

/// Re-derive the usage cache of every module from its current tree. Trees are
/// parsed on demand; graph edges are only read, never touched.
pub fn collect_usage(graph: &mut ModuleGraph, context: &Arc<Context>) -> Result<()> {
    for id in graph.get_module_ids() {
        let deps = dependency_snapshot(graph, &id);
        let module = graph.get_module_mut(&id).unwrap();
        for unit in &mut module.outputs {
            let ast = unit.ensure_ast(&id.id, context)?;
            let usage = analyze_unit(&ast.ast, &id, &deps)?;
            unit.usage = Some(usage);
        }
    }
    Ok(())
}

pub fn dependency_snapshot(graph: &ModuleGraph, id: &ModuleId) -> Vec<(String, ModuleId)> {
    graph
        .get_dependencies(id)
        .into_iter()
        .map(|(target, dep)| (dep.source.clone(), target.clone()))
        .collect()
}

/// One read-only walk over a unit's tree: import/require edges, export
/// declarations, and the CommonJS opacity verdict.
pub fn analyze_unit(
    ast: &SwcModule,
    module_id: &ModuleId,
    deps: &[(String, ModuleId)],
) -> Result<ModuleUsage> {
    let resolve = |source: &str| -> Result<ModuleId> {
        deps.iter()
            .find(|(dep_source, _)| dep_source == source)
            .map(|(_, target)| target.clone())
            .ok_or_else(|| {
                anyhow!(SerializeError::UnresolvedSpecifier {
                    specifier: source.to_string(),
                    module: module_id.id.clone(),
                })
            })
    };

    let mut imports = vec![];
    let mut exports = vec![];

    for item in &ast.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::Import(import_decl) => {
                let source = import_decl.src.value.to_string();
                let mut specifiers = vec![];
                for specifier in &import_decl.specifiers {
                    match specifier {
                        swc_core::ecma::ast::ImportSpecifier::Named(named) => {
                            specifiers.push(ImportSpecifierRecord {
                                kind: ImportSpecifierKind::Named,
                                imported: named.imported.as_ref().map(export_name),
                                local: named.local.sym.to_string(),
                            });
                        }
                        swc_core::ecma::ast::ImportSpecifier::Default(default) => {
                            specifiers.push(ImportSpecifierRecord {
                                kind: ImportSpecifierKind::Default,
                                imported: None,
                                local: default.local.sym.to_string(),
                            });
                        }
                        swc_core::ecma::ast::ImportSpecifier::Namespace(namespace) => {
                            specifiers.push(ImportSpecifierRecord {
                                kind: ImportSpecifierKind::Namespace,
                                imported: None,
                                local: namespace.local.sym.to_string(),
                            });
                        }
                    }
                }
                imports.push(ImportRecord {
                    resolved_id: resolve(&source)?,
                    source,
                    specifiers,
                    legacy: false,
                });
            }
            ModuleDecl::ExportDecl(export_decl) => match &export_decl.decl {
                Decl::Class(class_decl) => exports.push(ExportRecord::Named {
                    local: class_decl.ident.sym.to_string(),
                    exported: None,
                }),
                Decl::Fn(fn_decl) => exports.push(ExportRecord::Named {
                    local: fn_decl.ident.sym.to_string(),
                    exported: None,
                }),
                Decl::Var(var_decl) => {
                    for declarator in &var_decl.decls {
                        let mut collector = DefinedIdentCollector::new();
                        declarator.name.visit_with(&mut collector);
                        for ident in collector.defined_ident {
                            exports.push(ExportRecord::Named {
                                local: ident,
                                exported: None,
                            });
                        }
                    }
                }
                _ => {}
            },
            ModuleDecl::ExportNamed(named) => {
                let mut import_specifiers = vec![];
                let mut star_reexport = false;
                for specifier in &named.specifiers {
                    match specifier {
                        swc_core::ecma::ast::ExportSpecifier::Named(specifier) => {
                            let local = export_name(&specifier.orig);
                            let exported = specifier.exported.as_ref().map(export_name);
                            if named.src.is_some() {
                                import_specifiers.push(ImportSpecifierRecord {
                                    kind: ImportSpecifierKind::Named,
                                    imported: Some(local.clone()),
                                    local: local.clone(),
                                });
                            }
                            exports.push(ExportRecord::Named { local, exported });
                        }
                        // export * as ns from "x"
                        swc_core::ecma::ast::ExportSpecifier::Namespace(specifier) => {
                            star_reexport = true;
                            exports.push(ExportRecord::Named {
                                local: export_name(&specifier.name),
                                exported: None,
                            });
                        }
                        swc_core::ecma::ast::ExportSpecifier::Default(_) => {}
                    }
                }
                if let Some(src) = &named.src {
                    let source = src.value.to_string();
                    imports.push(ImportRecord {
                        resolved_id: resolve(&source)?,
                        source,
                        specifiers: import_specifiers,
                        legacy: star_reexport,
                    });
                }
            }
            ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_) => {
                exports.push(ExportRecord::Default);
            }
            // the full export set of the target flows through; opaque edge
            ModuleDecl::ExportAll(export_all) => {
                let source = export_all.src.value.to_string();
                imports.push(ImportRecord {
                    resolved_id: resolve(&source)?,
                    source,
                    specifiers: vec![],
                    legacy: true,
                });
            }
            _ => {}
        }
    }

    // require()/import() calls anywhere in the body
    let mut require_collector = RequireCollector::default();
    ast.visit_with(&mut require_collector);
    for source in require_collector.sources {
        imports.push(ImportRecord {
            resolved_id: resolve(&source)?,
            source,
            specifiers: vec![],
            legacy: true,
        });
    }

    Ok(ModuleUsage {
        imports,
        exports,
        opacity: detect_export_shape(ast),
    })
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

#[derive(Default)]
struct RequireCollector {
    bindings: Lrc<AHashSet<Id>>,
    sources: Vec<String>,
}

impl Visit for RequireCollector {
    fn visit_module(&mut self, module: &SwcModule) {
        self.bindings = Lrc::new(collect_decls(module));
        module.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, expr: &CallExpr) {
        if is_commonjs_require(expr, &self.bindings) || is_dynamic_import(expr) {
            if let Some(source) = get_first_arg_str(expr) {
                self.sources.push(source);
                return;
            }
        }
        expr.visit_children_with(self);
    }
}

pub fn is_dynamic_import(call_expr: &CallExpr) -> bool {
    matches!(&call_expr.callee, Callee::Import(Import { .. }))
}

pub fn is_commonjs_require(call_expr: &CallExpr, bindings: &Lrc<AHashSet<Id>>) -> bool {
    if let Callee::Expr(callee) = &call_expr.callee {
        if let Expr::Ident(ident) = &**callee {
            // a locally bound `require` is not the runtime one
            return ident.sym == *"require" && !bindings.contains(&ident.to_id());
        }
    }
    false
}

pub fn get_first_arg_str(call_expr: &CallExpr) -> Option<String> {
    if let Some(arg) = call_expr.args.first() {
        if let Expr::Lit(Lit::Str(str_)) = &*arg.expr {
            return Some(str_.value.to_string());
        }
    }
    None
}
