pub mod bundle;
pub mod static_export;

use std::sync::Arc;

use anyhow::Result;

use crate::config::SerializerOptions;
use crate::context::Context;
use crate::module::{Module, ModuleId};
use crate::module_graph::ModuleGraph;
use crate::regenerate::regenerate_modules;
use crate::tree_shaking::{shake, PruneMode};

/// The four-tuple every pipeline stage consumes and produces: entry point,
/// prepended modules, the graph, and the request options.
pub struct SerializerParams {
    pub entry_point: ModuleId,
    pub prepend: Vec<Module>,
    pub graph: ModuleGraph,
    pub options: Arc<SerializerOptions>,
}

#[derive(Debug)]
pub enum BundleOutput {
    Code(String),
    CodeWithMap { code: String, map: String },
    Assets(String),
}

impl BundleOutput {
    pub fn as_code(&self) -> Option<&str> {
        match self {
            BundleOutput::Code(code) => Some(code),
            BundleOutput::CodeWithMap { code, .. } => Some(code),
            BundleOutput::Assets(_) => None,
        }
    }
}

/// One rewriting stage. Stages run strictly in construction order; none of
/// them may assume it runs first or last.
pub trait SerializerStage {
    fn name(&self) -> &str;
    fn process(&self, params: SerializerParams, context: &Arc<Context>)
        -> Result<SerializerParams>;
}

/// The emission step that always runs last.
pub trait FinalSerializer {
    fn name(&self) -> &str;
    fn serialize(&self, params: SerializerParams, context: &Arc<Context>) -> Result<BundleOutput>;
}

/// Composes optional stages plus an optional final serializer into one
/// serializer. Absent stages are skipped; a stage error aborts the chain and
/// no partial output is produced.
pub struct SerializerChain {
    stages: Vec<Arc<dyn SerializerStage>>,
    last: Arc<dyn FinalSerializer>,
}

impl SerializerChain {
    pub fn new(
        stages: Vec<Option<Arc<dyn SerializerStage>>>,
        last: Option<Arc<dyn FinalSerializer>>,
    ) -> Self {
        Self {
            stages: stages.into_iter().flatten().collect(),
            last: last.unwrap_or_else(|| Arc::new(DefaultSerializer)),
        }
    }

    pub fn serialize(
        &self,
        mut params: SerializerParams,
        context: &Arc<Context>,
    ) -> Result<BundleOutput> {
        for stage in &self.stages {
            params = stage.process(params, context)?;
        }
        self.last.serialize(params, context)
    }
}

/// The tree-shaking pass as one chain link: prune to fixpoint, then
/// regenerate every touched unit.
pub struct TreeShakeStage {
    pub mode: PruneMode,
}

impl TreeShakeStage {
    pub fn new() -> Self {
        Self {
            mode: PruneMode::Remove,
        }
    }
}

impl Default for TreeShakeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializerStage for TreeShakeStage {
    fn name(&self) -> &str {
        "tree-shake"
    }

    fn process(
        &self,
        mut params: SerializerParams,
        context: &Arc<Context>,
    ) -> Result<SerializerParams> {
        if !params.options.tree_shaking {
            return Ok(params);
        }
        shake(&mut params.graph, context, self.mode)?;
        regenerate_modules(&mut params.graph, context)?;
        Ok(params)
    }
}

/// Default final step: stringify the whole bundle; static-export requests
/// branch into the asset manifest, everything else passes through verbatim.
pub struct DefaultSerializer;

impl FinalSerializer for DefaultSerializer {
    fn name(&self) -> &str {
        "default"
    }

    fn serialize(&self, params: SerializerParams, context: &Arc<Context>) -> Result<BundleOutput> {
        let bundle = bundle::stringify(&params)?;
        if !params.options.is_static_export() {
            return Ok(BundleOutput::Code(bundle.into_code()));
        }
        static_export::serialize_static(bundle, &params, context)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};

    use super::{
        BundleOutput, FinalSerializer, SerializerChain, SerializerParams, SerializerStage,
        TreeShakeStage,
    };
    use crate::context::Context;
    use crate::module::Module;
    use crate::module_graph::ModuleGraph;
    use crate::test_helper::{build_graph, js_module, test_context, test_params};

    struct PrependStage(&'static str);

    impl SerializerStage for PrependStage {
        fn name(&self) -> &str {
            "prepend"
        }

        fn process(
            &self,
            mut params: SerializerParams,
            _context: &Arc<Context>,
        ) -> Result<SerializerParams> {
            params
                .prepend
                .push(Module::synthetic(format!("/{}", self.0), self.0));
            Ok(params)
        }
    }

    struct FailingStage;

    impl SerializerStage for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(
            &self,
            _params: SerializerParams,
            _context: &Arc<Context>,
        ) -> Result<SerializerParams> {
            Err(anyhow!("stage exploded"))
        }
    }

    #[test]
    fn test_stages_run_in_order_and_none_is_skipped() {
        let context = test_context();
        let chain = SerializerChain::new(
            vec![
                Some(Arc::new(PrependStage("one")) as Arc<dyn SerializerStage>),
                None,
                Some(Arc::new(PrependStage("two")) as Arc<dyn SerializerStage>),
            ],
            None,
        );
        let output = chain
            .serialize(test_params("/index.js", ModuleGraph::new()), &context)
            .unwrap();
        assert_eq!(output.as_code(), Some("one\ntwo"));
    }

    #[test]
    fn test_stage_error_aborts_chain() {
        let context = test_context();
        let chain = SerializerChain::new(
            vec![
                Some(Arc::new(FailingStage) as Arc<dyn SerializerStage>),
                Some(Arc::new(PrependStage("never")) as Arc<dyn SerializerStage>),
            ],
            None,
        );
        let err = chain
            .serialize(test_params("/index.js", ModuleGraph::new()), &context)
            .unwrap_err();
        assert!(err.to_string().contains("stage exploded"));
    }

    #[test]
    fn test_tree_shake_stage_end_to_end() {
        let context = test_context();
        let graph = build_graph(
            vec![
                js_module(
                    "/index.js",
                    r#"import { add } from "./util";
console.log(add(1, 2));"#,
                    true,
                ),
                js_module(
                    "/util.js",
                    r#"export function add(a, b) { return a + b; }
export function unusedHelper() { return 0; }"#,
                    false,
                ),
            ],
            &[("/index.js", "/util.js", "./util")],
        );
        let chain = SerializerChain::new(
            vec![Some(Arc::new(TreeShakeStage::new()) as Arc<dyn SerializerStage>)],
            None,
        );
        let output = chain
            .serialize(test_params("/index.js", graph), &context)
            .unwrap();
        let code = output.as_code().unwrap();

        assert!(code.contains("__d(function(global, require"));
        assert!(code.contains("add"));
        assert!(!code.contains("unusedHelper"));
        assert!(code.trim_end().ends_with("require(0);"));
    }

    #[test]
    fn test_tree_shake_stage_respects_disable_flag() {
        let context = test_context();
        let graph = build_graph(
            vec![
                js_module(
                    "/index.js",
                    r#"import { add } from "./util";
console.log(add(1, 2));"#,
                    true,
                ),
                js_module(
                    "/util.js",
                    r#"export function add(a, b) { return a + b; }
export function unusedHelper() { return 0; }"#,
                    false,
                ),
            ],
            &[("/index.js", "/util.js", "./util")],
        );
        let mut params = test_params("/index.js", graph);
        let mut options = crate::config::SerializerOptions::new("/project", "/project");
        options.tree_shaking = false;
        params.options = Arc::new(options);

        let chain = SerializerChain::new(
            vec![Some(Arc::new(TreeShakeStage::new()) as Arc<dyn SerializerStage>)],
            None,
        );
        let output = chain.serialize(params, &context).unwrap();
        let code = output.as_code().unwrap();
        // pass disabled: units go out exactly as the transformer left them
        assert!(code.contains("unusedHelper"));
        assert!(code.contains("import { add }"));
    }

    #[test]
    fn test_custom_final_serializer() {
        struct CodeWithMapSerializer;

        impl FinalSerializer for CodeWithMapSerializer {
            fn name(&self) -> &str {
                "code-with-map"
            }

            fn serialize(
                &self,
                params: SerializerParams,
                _context: &Arc<Context>,
            ) -> Result<BundleOutput> {
                let bundle = super::bundle::stringify(&params)?;
                Ok(BundleOutput::CodeWithMap {
                    code: bundle.into_code(),
                    map: "{}".to_string(),
                })
            }
        }

        let context = test_context();
        let chain = SerializerChain::new(vec![], Some(Arc::new(CodeWithMapSerializer)));
        let output = chain
            .serialize(test_params("/index.js", ModuleGraph::new()), &context)
            .unwrap();
        assert!(matches!(output, BundleOutput::CodeWithMap { .. }));
    }
}
