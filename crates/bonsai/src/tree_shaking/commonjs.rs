use swc_core::ecma::ast::{
    AssignExpr, CallExpr, Callee, Expr, Ident, MemberExpr, MemberProp, Module, PatOrExpr,
};
use swc_core::ecma::visit::{Visit, VisitWith};

use crate::module::ExportOpacity;

/// Whole-object CommonJS export mutation makes a module's export set
/// impossible to enumerate statically. Anything else touching
/// `module.exports`/`exports` that this predicate does not recognize is
/// `Unknown`, and `Unknown` is treated as opaque downstream.
pub fn detect_export_shape(module: &Module) -> ExportOpacity {
    let mut detector = CjsShapeDetector {
        opacity: ExportOpacity::Transparent,
    };
    module.visit_with(&mut detector);
    detector.opacity
}

struct CjsShapeDetector {
    opacity: ExportOpacity,
}

impl CjsShapeDetector {
    fn mark(&mut self, opacity: ExportOpacity) {
        // never downgrade a definite verdict
        match (self.opacity, opacity) {
            (ExportOpacity::Opaque, _) => {}
            (_, ExportOpacity::Opaque) => self.opacity = ExportOpacity::Opaque,
            (ExportOpacity::Transparent, ExportOpacity::Unknown) => {
                self.opacity = ExportOpacity::Unknown
            }
            _ => {}
        }
    }
}

fn is_exports_ident(ident: &Ident) -> bool {
    ident.sym == *"exports"
}

/// `module.exports` or bare `exports`.
fn is_exports_object(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(ident) => is_exports_ident(ident),
        Expr::Member(MemberExpr { obj, prop, .. }) => {
            matches!(&**obj, Expr::Ident(obj_ident) if obj_ident.sym == *"module")
                && matches!(prop, MemberProp::Ident(prop_ident) if is_exports_ident(prop_ident))
        }
        _ => false,
    }
}

impl Visit for CjsShapeDetector {
    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        let target = match &n.left {
            PatOrExpr::Expr(expr) => Some(&**expr),
            PatOrExpr::Pat(pat) => match &**pat {
                swc_core::ecma::ast::Pat::Expr(expr) => Some(&**expr),
                _ => None,
            },
        };
        if let Some(target) = target {
            // module.exports = … / exports = …
            if is_exports_object(target) {
                self.mark(ExportOpacity::Opaque);
            }
            // module.exports.x = … / exports.x = …
            if let Expr::Member(MemberExpr { obj, .. }) = target {
                if is_exports_object(obj) {
                    self.mark(ExportOpacity::Opaque);
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if let Callee::Expr(callee) = &n.callee {
            if let Expr::Member(MemberExpr { obj, prop, .. }) = &**callee {
                let is_object_fn = matches!(&**obj, Expr::Ident(ident) if ident.sym == *"Object")
                    && matches!(
                        prop,
                        MemberProp::Ident(prop_ident)
                            if prop_ident.sym == *"assign" || prop_ident.sym == *"defineProperties"
                    );
                if is_object_fn {
                    if let Some(first) = n.args.first() {
                        if is_exports_object(&first.expr) {
                            self.mark(ExportOpacity::Opaque);
                        }
                    }
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        let is_module_exports = matches!(&*n.obj, Expr::Ident(obj) if obj.sym == *"module")
            && matches!(&n.prop, MemberProp::Ident(prop) if is_exports_ident(prop));
        if is_module_exports {
            self.mark(ExportOpacity::Unknown);
        }
        // non-computed property names are not reads of `exports`
        n.obj.visit_with(self);
        if let MemberProp::Computed(computed) = &n.prop {
            computed.visit_with(self);
        }
    }

    fn visit_ident(&mut self, n: &Ident) {
        if is_exports_ident(n) {
            self.mark(ExportOpacity::Unknown);
        }
    }
}
