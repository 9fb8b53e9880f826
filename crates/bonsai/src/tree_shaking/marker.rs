use std::collections::HashSet;

use swc_core::ecma::ast::{
    Decl, ExportDecl, ExportDefaultDecl, ExportDefaultExpr, ExportSpecifier, ImportDecl,
};
use swc_core::ecma::visit::{VisitMut, VisitMutWith, VisitWith};

use crate::ast::comments::Comments;
use crate::tree_shaking::collectors::DefinedIdentCollector;
use crate::tree_shaking::remove_unused::module_export_name;

/// Annotate-only rendition of the pruning pass: dead exports and dead import
/// specifiers get a leading `#__UNUSED__` marker and nothing is removed, so
/// program behavior is unchanged.
pub struct UnusedMarker<'a, 'b> {
    /// `None` means every export is live (opaque or unprunable module).
    live: Option<&'a HashSet<String>>,
    used_idents: &'a HashSet<String>,
    comments: &'b mut Comments,
}

impl<'a, 'b> UnusedMarker<'a, 'b> {
    pub fn new(
        live: Option<&'a HashSet<String>>,
        used_idents: &'a HashSet<String>,
        comments: &'b mut Comments,
    ) -> Self {
        Self {
            live,
            used_idents,
            comments,
        }
    }

    fn is_live(&self, name: &str) -> bool {
        self.live.map_or(true, |live| live.contains(name))
    }
}

impl VisitMut for UnusedMarker<'_, '_> {
    fn visit_mut_export_decl(&mut self, export_decl: &mut ExportDecl) {
        match &mut export_decl.decl {
            Decl::Var(var_decl) => {
                for declarator in &var_decl.decls {
                    let mut collector = DefinedIdentCollector::new();
                    declarator.name.visit_with(&mut collector);
                    if !collector.defined_ident.iter().any(|name| self.is_live(name)) {
                        self.comments.add_unused_comment(declarator.span.lo);
                    }
                }
            }
            Decl::Class(class_decl) => {
                if !self.is_live(&class_decl.ident.sym) {
                    self.comments.add_unused_comment(class_decl.ident.span.lo);
                }
            }
            Decl::Fn(fn_decl) => {
                if !self.is_live(&fn_decl.ident.sym) {
                    self.comments.add_unused_comment(fn_decl.ident.span.lo);
                }
            }
            _ => (),
        }
    }

    fn visit_mut_export_default_decl(&mut self, default_decl: &mut ExportDefaultDecl) {
        if !self.is_live("default") {
            self.comments.add_unused_comment(default_decl.span.lo);
        }
    }

    fn visit_mut_export_default_expr(&mut self, default_expr: &mut ExportDefaultExpr) {
        if !self.is_live("default") {
            self.comments.add_unused_comment(default_expr.span.lo);
        }
    }

    fn visit_mut_export_specifiers(&mut self, specifiers: &mut Vec<ExportSpecifier>) {
        for specifier in specifiers.iter() {
            if let ExportSpecifier::Named(named) = specifier {
                let exported = named.exported.as_ref().unwrap_or(&named.orig);
                if !self.is_live(&module_export_name(exported)) {
                    self.comments.add_unused_comment(named.span.lo);
                }
            }
        }
    }

    fn visit_mut_import_decl(&mut self, import_decl: &mut ImportDecl) {
        for specifier in &import_decl.specifiers {
            let local = match specifier {
                swc_core::ecma::ast::ImportSpecifier::Named(named) => &named.local,
                swc_core::ecma::ast::ImportSpecifier::Default(default) => &default.local,
                swc_core::ecma::ast::ImportSpecifier::Namespace(namespace) => &namespace.local,
            };
            if !self.used_idents.contains(&*local.sym.to_string()) {
                self.comments.add_unused_comment(local.span.lo);
            }
        }
        import_decl.visit_mut_children_with(self);
    }
}
