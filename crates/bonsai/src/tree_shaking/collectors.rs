use std::collections::HashSet;

use swc_core::ecma::ast::{
    BindingIdent, ClassDecl, ClassExpr, ExportSpecifier, FnDecl, FnExpr, Ident, ImportDecl,
    LabeledStmt, MemberExpr, MemberProp, Module, ModuleExportName, NamedExport, ObjectPatProp,
    Pat, PropName,
};
use swc_core::ecma::visit::{Visit, VisitWith};

/// Collects binding names out of a pattern; expressions reachable from the
/// pattern (defaults, computed keys) surface as used idents.
#[derive(Debug, Default)]
pub struct DefinedIdentCollector {
    pub defined_ident: HashSet<String>,
    pub used_ident: HashSet<String>,
}

impl DefinedIdentCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Visit for DefinedIdentCollector {
    fn visit_pat(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(bi) => {
                self.defined_ident.insert(bi.id.sym.to_string());
            }
            // const [x, y] = [1, 2];
            Pat::Array(array_pat) => {
                for elem in array_pat.elems.iter().flatten() {
                    self.visit_pat(elem);
                }
            }
            // const [x, ...rest] = [1, 2, 3, 4];
            Pat::Rest(rest_pat) => {
                self.visit_pat(&rest_pat.arg);
            }
            // const { x, y } = { x: 1, y: 2 };
            Pat::Object(obj_pat) => {
                for prop in &obj_pat.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv_prop) => {
                            self.visit_pat(&kv_prop.value);
                        }
                        ObjectPatProp::Assign(assign_prop) => {
                            self.defined_ident.insert(assign_prop.key.sym.to_string());

                            if let Some(value) = &assign_prop.value {
                                let mut used = BodyUsedIdents::default();
                                value.visit_with(&mut used);
                                self.used_ident.extend(used.used);
                            }
                        }
                        ObjectPatProp::Rest(rest_prop) => {
                            self.visit_pat(&rest_prop.arg);
                        }
                    }
                }
            }
            Pat::Assign(assign_pat) => {
                self.visit_pat(&assign_pat.left);
            }
            Pat::Invalid(_) | Pat::Expr(_) => {}
        }
    }
}

/// Every identifier read somewhere in the module body. Identifiers inside
/// import declarations, pure binding positions (declaration names, parameters,
/// pattern keys) and non-computed property names are not reads and are
/// excluded.
#[derive(Debug, Default)]
pub struct BodyUsedIdents {
    pub used: HashSet<String>,
}

impl Visit for BodyUsedIdents {
    fn visit_ident(&mut self, ident: &Ident) {
        self.used.insert(ident.sym.to_string());
    }

    fn visit_import_decl(&mut self, _n: &ImportDecl) {}

    fn visit_binding_ident(&mut self, _n: &BindingIdent) {}

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        n.obj.visit_with(self);
        if let MemberProp::Computed(computed) = &n.prop {
            computed.visit_with(self);
        }
    }

    fn visit_prop_name(&mut self, n: &PropName) {
        if let PropName::Computed(computed) = n {
            computed.visit_with(self);
        }
    }

    fn visit_object_pat_prop(&mut self, n: &ObjectPatProp) {
        match n {
            ObjectPatProp::KeyValue(kv) => {
                kv.key.visit_with(self);
                kv.value.visit_with(self);
            }
            ObjectPatProp::Assign(assign) => {
                if let Some(value) = &assign.value {
                    value.visit_with(self);
                }
            }
            ObjectPatProp::Rest(rest) => {
                rest.arg.visit_with(self);
            }
        }
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        n.function.visit_with(self);
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        n.class.visit_with(self);
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        n.function.visit_with(self);
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        n.class.visit_with(self);
    }

    fn visit_labeled_stmt(&mut self, n: &LabeledStmt) {
        n.body.visit_with(self);
    }

    fn visit_named_export(&mut self, n: &NamedExport) {
        // `export { x }` reads the local x; a re-export from another module
        // does not
        if n.src.is_some() {
            return;
        }
        for specifier in &n.specifiers {
            if let ExportSpecifier::Named(named) = specifier {
                if let ModuleExportName::Ident(ident) = &named.orig {
                    self.used.insert(ident.sym.to_string());
                }
            }
        }
    }
}

pub fn body_used_idents(module: &Module) -> HashSet<String> {
    let mut collector = BodyUsedIdents::default();
    module.visit_with(&mut collector);
    collector.used
}

/// Every identifier occurring anywhere in the tree, binding or not. Used to
/// pick collision-free helper names.
#[derive(Debug, Default)]
pub struct IdentCollector {
    pub idents: HashSet<String>,
}

impl Visit for IdentCollector {
    fn visit_ident(&mut self, ident: &Ident) {
        self.idents.insert(ident.sym.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use swc_core::ecma::visit::VisitWith;

    use super::{body_used_idents, DefinedIdentCollector};
    use crate::ast::js_ast::JsAst;
    use crate::context::Context;

    fn parse(code: &str) -> (JsAst, Arc<Context>) {
        let context = Arc::new(Context::new());
        let ast = JsAst::parse("test.js", code, &context).unwrap();
        (ast, context)
    }

    #[test]
    fn test_body_used_idents_skips_import_bindings() {
        let (ast, _) = parse(
            r#"import { a, b } from "./m";
console.log(a);"#,
        );
        let used = body_used_idents(&ast.ast);
        assert!(used.contains("a"));
        assert!(used.contains("console"));
        assert!(!used.contains("b"));
    }

    #[test]
    fn test_body_used_idents_skips_binding_positions() {
        let (ast, _) = parse(
            r#"const x = y;
function f(param) { return param; }
obj.prop;"#,
        );
        let used = body_used_idents(&ast.ast);
        assert!(used.contains("y"));
        assert!(used.contains("obj"));
        assert!(used.contains("param"));
        assert!(!used.contains("x"));
        assert!(!used.contains("f"));
        assert!(!used.contains("prop"));
    }

    #[test]
    fn test_body_used_idents_counts_local_export_list() {
        let (ast, _) = parse(
            r#"const a = 1;
export { a };
export { b } from "./other";"#,
        );
        let used = body_used_idents(&ast.ast);
        assert!(used.contains("a"));
        assert!(!used.contains("b"));
    }

    #[test]
    fn test_defined_ident_collector_patterns() {
        let (ast, _) = parse("const { a, b: [c, ...rest], d = fallback } = source;");
        let mut collector = DefinedIdentCollector::new();
        // the single declarator's name pattern
        if let swc_core::ecma::ast::ModuleItem::Stmt(swc_core::ecma::ast::Stmt::Decl(
            swc_core::ecma::ast::Decl::Var(var_decl),
        )) = &ast.ast.body[0]
        {
            var_decl.decls[0].name.visit_with(&mut collector);
        }
        assert!(collector.defined_ident.contains("a"));
        assert!(collector.defined_ident.contains("c"));
        assert!(collector.defined_ident.contains("rest"));
        assert!(collector.defined_ident.contains("d"));
        assert!(collector.used_ident.contains("fallback"));
    }
}
