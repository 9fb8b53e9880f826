use std::collections::HashSet;

use swc_core::ecma::ast::{
    Decl, DefaultDecl, ExportSpecifier, Module, ModuleDecl, ModuleExportName, ModuleItem,
};
use swc_core::ecma::visit::{VisitMut, VisitWith};

use crate::tree_shaking::collectors::DefinedIdentCollector;

pub fn module_export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

/// Strips export declarations no surviving importer uses. A declaration whose
/// binding is still read by the module's own body stays untouched; removing
/// it would break the module locally.
pub struct UnusedExportRemover<'a> {
    live: &'a HashSet<String>,
    locally_used: &'a HashSet<String>,
    /// Declarations and specifiers dropped by this visitor.
    pub removed: usize,
}

impl<'a> UnusedExportRemover<'a> {
    pub fn new(live: &'a HashSet<String>, locally_used: &'a HashSet<String>) -> Self {
        Self {
            live,
            locally_used,
            removed: 0,
        }
    }

    fn keep_decl(&self, name: &str) -> bool {
        self.live.contains(name) || self.locally_used.contains(name)
    }
}

impl VisitMut for UnusedExportRemover<'_> {
    fn visit_mut_module(&mut self, module: &mut Module) {
        let before = count_exportish_nodes(module);
        module.body.retain_mut(|item| {
            let ModuleItem::ModuleDecl(decl) = item else {
                return true;
            };
            match decl {
                ModuleDecl::ExportDecl(export_decl) => match &mut export_decl.decl {
                    Decl::Fn(fn_decl) => self.keep_decl(&fn_decl.ident.sym),
                    Decl::Class(class_decl) => self.keep_decl(&class_decl.ident.sym),
                    Decl::Var(var_decl) => {
                        var_decl.decls.retain(|declarator| {
                            let mut collector = DefinedIdentCollector::new();
                            declarator.name.visit_with(&mut collector);
                            collector.defined_ident.iter().any(|name| self.keep_decl(name))
                        });
                        !var_decl.decls.is_empty()
                    }
                    _ => true,
                },
                ModuleDecl::ExportDefaultDecl(default_decl) => {
                    if self.live.contains("default") {
                        return true;
                    }
                    // a named default fn/class may still be read locally
                    match &default_decl.decl {
                        DefaultDecl::Fn(fn_expr) => fn_expr
                            .ident
                            .as_ref()
                            .map_or(false, |ident| self.locally_used.contains(&*ident.sym)),
                        DefaultDecl::Class(class_expr) => class_expr
                            .ident
                            .as_ref()
                            .map_or(false, |ident| self.locally_used.contains(&*ident.sym)),
                        DefaultDecl::TsInterfaceDecl(_) => true,
                    }
                }
                ModuleDecl::ExportDefaultExpr(_) => self.live.contains("default"),
                ModuleDecl::ExportNamed(named) => {
                    named.specifiers.retain(|specifier| match specifier {
                        ExportSpecifier::Named(named_specifier) => {
                            let exported = named_specifier
                                .exported
                                .as_ref()
                                .unwrap_or(&named_specifier.orig);
                            self.live.contains(&module_export_name(exported))
                        }
                        ExportSpecifier::Namespace(namespace) => {
                            self.live.contains(&module_export_name(&namespace.name))
                        }
                        ExportSpecifier::Default(_) => self.live.contains("default"),
                    });
                    !named.specifiers.is_empty()
                }
                // cannot be enumerated here, so never removed
                ModuleDecl::ExportAll(_) => true,
                _ => true,
            }
        });
        self.removed += before - count_exportish_nodes(module);
    }
}

/// Export declarations plus their inner declarators/specifiers; the removal
/// counters compare this before and after a pass over the body.
fn count_exportish_nodes(module: &Module) -> usize {
    module
        .body
        .iter()
        .map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export_decl)) => {
                match &export_decl.decl {
                    Decl::Var(var_decl) => 1 + var_decl.decls.len(),
                    _ => 1,
                }
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => 1 + named.specifiers.len(),
            ModuleItem::ModuleDecl(
                ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_),
            ) => 1,
            _ => 0,
        })
        .sum()
}

/// Drops import specifiers whose local binding is never read, and whole
/// declarations once their specifier list empties out. Bare side-effect
/// imports never had bindings and always stay.
pub struct UnusedImportRemover<'a> {
    used: &'a HashSet<String>,
    /// Specifiers (and emptied declarations) dropped by this visitor.
    pub removed: usize,
}

impl<'a> UnusedImportRemover<'a> {
    pub fn new(used: &'a HashSet<String>) -> Self {
        Self { used, removed: 0 }
    }
}

impl VisitMut for UnusedImportRemover<'_> {
    fn visit_mut_module(&mut self, module: &mut Module) {
        let mut removed = 0;
        module.body.retain_mut(|item| {
            let ModuleItem::ModuleDecl(ModuleDecl::Import(import_decl)) = item else {
                return true;
            };
            if import_decl.specifiers.is_empty() {
                return true;
            }
            let before = import_decl.specifiers.len();
            let used = &self.used;
            import_decl.specifiers.retain(|specifier| {
                let local = match specifier {
                    swc_core::ecma::ast::ImportSpecifier::Named(named) => &named.local,
                    swc_core::ecma::ast::ImportSpecifier::Default(default) => &default.local,
                    swc_core::ecma::ast::ImportSpecifier::Namespace(namespace) => &namespace.local,
                };
                used.contains(&*local.sym.to_string())
            });
            removed += before - import_decl.specifiers.len();
            !import_decl.specifiers.is_empty()
        });
        self.removed += removed;
    }
}
