use std::sync::Arc;

use anyhow::{anyhow, Result};
use swc_core::common::GLOBALS;
use swc_core::ecma::ast::{Expr, ModuleItem, Stmt};
use swc_core::ecma::transforms::base::feature::FeatureFlag;
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::transforms::module::common_js;
use swc_core::ecma::transforms::module::util::{Config as CjsConfig, ImportInterop};
use swc_core::ecma::visit::{FoldWith, VisitMutWith, VisitWith};
use tracing::debug;

use crate::ast::js_ast::JsAst;
use crate::ast::sourcemap::RawSourceMap;
use crate::context::Context;
use crate::module::{ModuleId, OutputUnit};
use crate::module_graph::ModuleGraph;
use crate::tree_shaking::collectors::IdentCollector;

/// Name of the module-definition runtime call every regenerated unit is
/// wrapped into. The dependency-map argument and any global prefix are
/// appended by later stages, not here.
pub const MODULE_FACTORY_NAME: &str = "__d";

/// Re-wrap every pruned tree into the module-function envelope and refresh
/// the unit's code, line count and positional metadata. Map segments are left
/// empty: minifying shaken output is a downstream collaborator's job.
pub fn regenerate_modules(graph: &mut ModuleGraph, context: &Arc<Context>) -> Result<()> {
    for id in graph.get_module_ids() {
        let module = graph.get_module_mut(&id).unwrap();
        for unit in &mut module.outputs {
            if unit.ast.is_none() {
                continue;
            }
            regenerate_unit(&id, unit, context)?;
        }
    }
    Ok(())
}

fn regenerate_unit(id: &ModuleId, unit: &mut OutputUnit, context: &Arc<Context>) -> Result<()> {
    let ast = unit.ast.take().unwrap();
    let (import_default, import_all) = derive_import_helper_names(&ast);
    debug!(
        "regenerating {} with helpers {}/{}",
        id.id, import_default, import_all
    );

    let comments = context.comments.read().unwrap().get_swc_comments().clone();
    let lowered = GLOBALS.set(&context.globals, || {
        let mut module = ast.ast;
        module.visit_mut_with(&mut resolver(
            ast.unresolved_mark,
            ast.top_level_mark,
            false,
        ));
        module.fold_with(&mut common_js::common_js(
            ast.unresolved_mark,
            CjsConfig {
                import_interop: Some(ImportInterop::None),
                ignore_dynamic: true,
                allow_top_level_this: true,
                ..Default::default()
            },
            FeatureFlag::empty(),
            Some(comments),
        ))
    });

    let wrapped = wrap_module(lowered, &import_default, &import_all, context)?;
    let generated = wrapped.generate(context)?;

    unit.code = generated.code;
    unit.lines = unit.code.lines().count();
    unit.map = RawSourceMap::default();
    unit.function_map = unit
        .function_map
        .take()
        .or_else(|| unit.legacy_function_map.take());
    Ok(())
}

/// Collision-free local names for the import-default / import-namespace
/// helper bindings, derived from the current tree.
pub fn derive_import_helper_names(ast: &JsAst) -> (String, String) {
    let mut collector = IdentCollector::default();
    ast.ast.visit_with(&mut collector);

    let pick = |base: &str| {
        let mut name = base.to_string();
        while collector.idents.contains(&name) {
            name = format!("${}", name);
        }
        name
    };
    (pick("_importDefault"), pick("_importAll"))
}

/// Wrap a lowered body into
/// `__d(function(global, require, <importDefault>, <importAll>, module, exports) { … });`.
fn wrap_module(
    body: swc_core::ecma::ast::Module,
    import_default: &str,
    import_all: &str,
    context: &Arc<Context>,
) -> Result<JsAst> {
    let envelope_src = format!(
        "{}(function(global, require, {}, {}, module, exports) {{}});",
        MODULE_FACTORY_NAME, import_default, import_all
    );
    let mut envelope = JsAst::parse("module-envelope.js", &envelope_src, context)?;

    let mut stmts = Some(
        body.body
            .into_iter()
            .filter_map(|item| match item {
                ModuleItem::Stmt(stmt) => Some(stmt),
                ModuleItem::ModuleDecl(_) => None,
            })
            .collect::<Vec<Stmt>>(),
    );

    for item in &mut envelope.ast.body {
        let ModuleItem::Stmt(Stmt::Expr(expr_stmt)) = item else {
            continue;
        };
        let Expr::Call(call_expr) = &mut *expr_stmt.expr else {
            continue;
        };
        if let Some(arg) = call_expr.args.first_mut() {
            if let Expr::Fn(fn_expr) = &mut *arg.expr {
                fn_expr
                    .function
                    .body
                    .as_mut()
                    .unwrap()
                    .stmts
                    .extend(stmts.take().unwrap());
                break;
            }
        }
    }
    if stmts.is_some() {
        return Err(anyhow!("module envelope template did not parse as a define call"));
    }
    Ok(envelope)
}
