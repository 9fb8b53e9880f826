use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::ast::js_ast::JsAst;
use crate::ast::sourcemap::RawSourceMap;
use crate::context::Context;

/// Graph key: the module's absolute path.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    pub id: String,
}

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Debug for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleId({})", self.id)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ResolveType {
    Import,
    ExportNamed,
    ExportAll,
    Require,
    DynamicImport,
}

/// One resolved edge as the resolver recorded it: the raw source specifier,
/// how it was reached, and its position among the module's imports.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub source: String,
    pub resolve_type: ResolveType,
    pub order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSpecifierKind {
    Default,
    Named,
    Namespace,
}

#[derive(Debug, Clone)]
pub struct ImportSpecifierRecord {
    pub kind: ImportSpecifierKind,
    /// Name on the exporting side; `None` for default/namespace bindings and
    /// for shorthand named imports (where it equals `local`).
    pub imported: Option<String>,
    pub local: String,
}

/// One import/require statement as the usage analyzer saw it. `legacy` edges
/// (require calls, dynamic imports, star re-exports) are opaque: every export
/// of the target counts as used and the edge is never detached by specifier
/// pruning.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub source: String,
    pub resolved_id: ModuleId,
    pub specifiers: Vec<ImportSpecifierRecord>,
    pub legacy: bool,
}

#[derive(Debug, Clone)]
pub enum ExportRecord {
    Default,
    Named {
        local: String,
        exported: Option<String>,
    },
}

impl ExportRecord {
    pub fn exported_name(&self) -> &str {
        match self {
            ExportRecord::Default => "default",
            ExportRecord::Named { local, exported } => exported.as_deref().unwrap_or(local),
        }
    }
}

/// Whether a module's export set can be enumerated statically. `Unknown`
/// must be treated as `Opaque` by every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOpacity {
    Transparent,
    Opaque,
    Unknown,
}

impl ExportOpacity {
    pub fn is_opaque(&self) -> bool {
        !matches!(self, ExportOpacity::Transparent)
    }
}

/// Derived usage facts for one output unit. This is a cache over the current
/// tree; it goes stale on any tree mutation and is recomputed rather than
/// patched.
#[derive(Debug, Clone)]
pub struct ModuleUsage {
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportRecord>,
    pub opacity: ExportOpacity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMap {
    pub names: Vec<String>,
    pub mappings: String,
}

/// One compiled representation of a module for one target flavor.
pub struct OutputUnit {
    pub flavor: String,
    pub code: String,
    pub lines: usize,
    pub ast: Option<JsAst>,
    pub map: RawSourceMap,
    pub function_map: Option<FunctionMap>,
    pub legacy_function_map: Option<FunctionMap>,
    pub usage: Option<ModuleUsage>,
}

impl OutputUnit {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let lines = code.lines().count();
        Self {
            flavor: "js/module".to_string(),
            code,
            lines,
            ast: None,
            map: RawSourceMap::default(),
            function_map: None,
            legacy_function_map: None,
            usage: None,
        }
    }

    /// Trees are parsed on demand from the stored code.
    pub fn ensure_ast(&mut self, path: &str, context: &Arc<Context>) -> Result<&mut JsAst> {
        if self.ast.is_none() {
            self.ast = Some(JsAst::parse(path, &self.code, context)?);
        }
        Ok(self.ast.as_mut().unwrap())
    }
}

pub struct Module {
    pub id: ModuleId,
    pub is_entry: bool,
    pub outputs: Vec<OutputUnit>,
}

impl Module {
    pub fn new(id: ModuleId, is_entry: bool, outputs: Vec<OutputUnit>) -> Self {
        Self {
            id,
            is_entry,
            outputs,
        }
    }

    /// A module that exists only in the output, e.g. the entry prelude.
    pub fn synthetic(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(ModuleId::new(id), false, vec![OutputUnit::new(code)])
    }
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Module id={}", self.id.id)
    }
}
