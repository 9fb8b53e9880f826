use std::sync::Arc;

use anyhow::{anyhow, Result};
use swc_core::common::{BytePos, FileName, LineCol, Mark, GLOBALS};
use swc_core::ecma::ast::{EsVersion, Module};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config as JsCodegenConfig, Emitter};
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{EsConfig, Parser, StringInput, Syntax};

use crate::ast::error::{GenerateError, ParseError};
use crate::context::Context;

/// A parsed module body plus the resolver marks needed by later transforms.
#[derive(Debug)]
pub struct JsAst {
    pub ast: Module,
    pub unresolved_mark: Mark,
    pub top_level_mark: Mark,
}

pub struct JsAstGenerated {
    pub code: String,
    pub mappings: Vec<(BytePos, LineCol)>,
}

impl JsAst {
    pub fn parse(path: &str, code: &str, context: &Arc<Context>) -> Result<Self> {
        let fm = context
            .cm
            .new_source_file(FileName::Real(path.into()), code.to_string());
        let comments = context.comments.read().unwrap();
        let syntax = Syntax::Es(EsConfig {
            jsx: false,
            decorators: true,
            decorators_before_export: true,
            ..Default::default()
        });
        let lexer = Lexer::new(
            syntax,
            EsVersion::Es2015,
            StringInput::from(&*fm),
            Some(comments.get_swc_comments()),
        );
        let mut parser = Parser::new_from(lexer);
        let ast = parser.parse_module();

        let mut ast_errors = parser.take_errors();
        if ast.is_err() {
            ast_errors.push(ast.clone().unwrap_err());
        }
        if !ast_errors.is_empty() {
            let messages = ast_errors
                .iter()
                .map(|err| format!("{}: {}", path, err.kind().msg()))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(anyhow!(ParseError::JsParseError { messages }));
        }
        let ast = ast.unwrap();
        drop(comments);

        // marks are created under GLOBALS and must be persisted for the
        // resolver and the module lowering
        GLOBALS.set(&context.globals, || {
            let top_level_mark = Mark::new();
            let unresolved_mark = Mark::new();
            Ok(JsAst {
                ast,
                unresolved_mark,
                top_level_mark,
            })
        })
    }

    pub fn generate(&self, context: &Arc<Context>) -> Result<JsAstGenerated> {
        let mut buf = vec![];
        let mut source_map_buf = vec![];
        let cm = context.cm.clone();
        {
            let comments = context.comments.read().unwrap();
            let mut emitter = Emitter {
                cfg: JsCodegenConfig::default()
                    .with_target(EsVersion::Es2015)
                    .with_omit_last_semi(true),
                cm: cm.clone(),
                comments: Some(comments.get_swc_comments()),
                wr: Box::new(JsWriter::new(
                    cm.clone(),
                    "\n",
                    &mut buf,
                    Some(&mut source_map_buf),
                )),
            };
            emitter.emit_module(&self.ast).map_err(|err| {
                anyhow!(GenerateError::JsGenerateError {
                    message: err.to_string()
                })
            })?;
        }

        let code = String::from_utf8(buf)?;
        Ok(JsAstGenerated {
            code,
            mappings: source_map_buf,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::JsAst;
    use crate::context::Context;

    #[test]
    fn test_parse_and_generate() {
        let context = Arc::new(Context::new());
        let ast = JsAst::parse("test.js", "const a = 1;\nconsole.log(a);", &context).unwrap();
        let generated = ast.generate(&context).unwrap();
        assert_eq!(generated.code.trim(), "const a = 1;\nconsole.log(a);");
        assert!(!generated.mappings.is_empty());
    }

    #[test]
    fn test_parse_error_carries_path() {
        let context = Arc::new(Context::new());
        let err = JsAst::parse("broken.js", "const = ;", &context).unwrap_err();
        assert!(err.to_string().contains("broken.js"));
    }
}
