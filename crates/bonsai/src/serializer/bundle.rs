use anyhow::Result;

use crate::regenerate::MODULE_FACTORY_NAME;
use crate::serializer::SerializerParams;

/// The whole-bundle stringification result: prelude text, numbered module
/// envelopes, and the entry invocation.
pub struct Bundle {
    pub pre: String,
    pub post: String,
    pub modules: Vec<(u64, String)>,
}

impl Bundle {
    /// Flatten to the executable bundle text; modules are ordered by their
    /// already-assigned numeric ids.
    pub fn into_code(mut self) -> String {
        self.modules.sort_by_key(|(id, _)| *id);
        let mut pieces = vec![];
        if !self.pre.is_empty() {
            pieces.push(self.pre);
        }
        pieces.extend(self.modules.into_iter().map(|(_, code)| code));
        if !self.post.is_empty() {
            pieces.push(self.post);
        }
        pieces.join("\n")
    }
}

/// Default whole-graph stringifier. Ids are assigned to every emitted module
/// before any ordering decision is made, so the later sort sees stable ids.
pub fn stringify(params: &SerializerParams) -> Result<Bundle> {
    let options = &params.options;

    let mut modules = vec![];
    for module in params.graph.get_modules() {
        if let Some(filter) = &options.module_filter {
            if !filter(module) {
                continue;
            }
        }
        let Some(unit) = module.outputs.first() else {
            continue;
        };
        let id = (options.module_id_for)(&module.id);
        modules.push((id, add_params_to_define_call(&unit.code, id)));
    }

    let pre = params
        .prepend
        .iter()
        .filter_map(|module| module.outputs.first().map(|unit| unit.code.clone()))
        .collect::<Vec<_>>()
        .join("\n");

    let post = if params.graph.has_module(&params.entry_point) {
        format!("require({});", (options.module_id_for)(&params.entry_point))
    } else {
        String::new()
    };

    Ok(Bundle { pre, post, modules })
}

/// Append the numeric module id to a `__d(…)` envelope. Code that is not an
/// envelope (e.g. raw prelude text) passes through untouched.
pub fn add_params_to_define_call(code: &str, id: u64) -> String {
    if !code.starts_with(MODULE_FACTORY_NAME) {
        return code.to_string();
    }
    match code.rfind(')') {
        Some(pos) => format!("{},{}{}", &code[..pos], id, &code[pos..]),
        None => code.to_string(),
    }
}
