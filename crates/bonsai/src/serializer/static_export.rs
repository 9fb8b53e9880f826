use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use pathdiff::diff_paths;
use serde::Serialize;
use serde_json::json;
use swc_core::base::sourcemap as swc_sourcemap;
use tracing::debug;

use crate::ast::sourcemap::RawSourceMap;
use crate::context::Context;
use crate::hash::content_hash_with_len;
use crate::module::OutputUnit;
use crate::serializer::bundle::Bundle;
use crate::serializer::{BundleOutput, SerializerParams};

/// Synthetic source name of the entry prelude; kept verbatim in emitted maps.
pub const PRELUDE_SOURCE: &str = "__prelude__";

const HASH_LEN: usize = 20;
const STATIC_SCRIPT_DIR: &str = "_expo/static/js/web";

#[derive(Debug, Serialize)]
pub struct AssetDescriptor {
    pub filename: String,
    #[serde(rename = "originFilename")]
    pub origin_filename: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub metadata: serde_json::Value,
    pub source: String,
}

/// Static-export emission: one JSON array of asset descriptors for the
/// script, optionally its source map, and any style assets the external
/// extractor supplies.
pub fn serialize_static(
    bundle: Bundle,
    params: &SerializerParams,
    context: &Arc<Context>,
) -> Result<BundleOutput> {
    let options = &params.options;
    let code = bundle.into_code();

    // content-derived naming keeps repeated identical builds at the same URL
    let script_name = if options.dev {
        "index.js".to_string()
    } else {
        format!(
            "{}/{}.js",
            STATIC_SCRIPT_DIR,
            content_hash_with_len(code.as_bytes(), HASH_LEN)
        )
    };
    debug!("emitting static script {}", script_name);

    let mut assets = vec![AssetDescriptor {
        filename: script_name.clone(),
        origin_filename: "index.js".to_string(),
        asset_type: "js".to_string(),
        metadata: json!({}),
        source: code,
    }];

    if options.include_maps {
        let map = build_joint_source_map(params, context)?;
        let map_name = if options.dev {
            "index.map".to_string()
        } else {
            format!("{}.map", script_name)
        };
        assets.push(AssetDescriptor {
            filename: map_name,
            origin_filename: "index.map".to_string(),
            asset_type: "map".to_string(),
            metadata: json!({}),
            source: map,
        });
    }

    if let Some(style_assets) = &options.style_assets {
        for style in style_assets(&params.graph, options) {
            assets.push(AssetDescriptor {
                filename: style.filename.clone(),
                origin_filename: style.filename,
                asset_type: "css".to_string(),
                metadata: json!({}),
                source: style.source,
            });
        }
    }

    Ok(BundleOutput::Assets(serde_json::to_string(&assets)?))
}

/// One source map spanning the prepended modules followed by the id-sorted
/// graph modules, with every absolute source path rewritten relative to the
/// server root. The synthetic prelude entry keeps its name.
pub fn build_joint_source_map(params: &SerializerParams, _context: &Arc<Context>) -> Result<String> {
    let options = &params.options;

    let mut sections: Vec<&OutputUnit> = params
        .prepend
        .iter()
        .filter_map(|module| module.outputs.first())
        .collect();

    let mut graph_units: Vec<(u64, &OutputUnit)> = vec![];
    for module in params.graph.get_modules() {
        if let Some(filter) = &options.module_filter {
            if !filter(module) {
                continue;
            }
        }
        if let Some(unit) = module.outputs.first() {
            graph_units.push(((options.module_id_for)(&module.id), unit));
        }
    }
    graph_units.sort_by_key(|(id, _)| *id);
    sections.extend(graph_units.into_iter().map(|(_, unit)| unit));

    let mut joint = RawSourceMap::default();
    let mut dst_line_offset = 0u32;
    for unit in sections {
        let map = &unit.map;
        let src_id_offset = joint.sources.len() as u32;
        let name_id_offset = joint.names.len() as u32;

        joint
            .tokens
            .extend(map.tokens.iter().map(|t| swc_sourcemap::RawToken {
                dst_line: t.dst_line + dst_line_offset,
                src_id: t.src_id + src_id_offset,
                name_id: t.name_id + name_id_offset,
                ..*t
            }));
        joint.names.extend(map.names.iter().cloned());
        joint.sources.extend(
            map.sources
                .iter()
                .map(|source| relativize_source(source, options.server_root.as_path())),
        );
        joint
            .sources_content
            .extend(map.sources_content.iter().cloned());

        // sections are joined by a newline in the flattened bundle
        dst_line_offset += unit.lines as u32;
    }

    let map: swc_sourcemap::SourceMap = joint.into();
    let mut buf = vec![];
    map.to_writer(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Absolute filesystem paths must not leak into published maps.
fn relativize_source(source: &str, server_root: &Path) -> String {
    if source == PRELUDE_SOURCE || !Path::new(source).is_absolute() {
        return source.to_string();
    }
    diff_paths(source, server_root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::config::{SerializerOptions, StyleAsset};
    use crate::module::{Module, ModuleId};
    use crate::serializer::{BundleOutput, DefaultSerializer, FinalSerializer};
    use crate::test_helper::{build_graph, js_module, test_context, test_params};

    fn static_options(dev: bool, maps: bool) -> SerializerOptions {
        let mut url = String::from(
            "http://localhost:8081/index.bundle?platform=web&serializer.output=static",
        );
        if maps {
            url.push_str("&serializer.map=true");
        }
        let mut options = SerializerOptions::new("/project", "/project")
            .apply_request_url(&url)
            .unwrap();
        options.dev = dev;
        options
    }

    fn prelude_only_params(options: SerializerOptions) -> crate::serializer::SerializerParams {
        let mut params = test_params("/index.js", build_graph(vec![], &[]));
        params
            .prepend
            .push(Module::synthetic("/__prelude__", "console.log(1)"));
        params.options = Arc::new(options);
        params
    }

    #[test]
    fn test_scenario_c_static_request_yields_asset_manifest() {
        let context = test_context();
        let params = prelude_only_params(static_options(true, true));

        let output = DefaultSerializer.serialize(params, &context).unwrap();
        let BundleOutput::Assets(json) = output else {
            panic!("expected asset manifest");
        };
        let assets: Value = serde_json::from_str(&json).unwrap();
        let assets = assets.as_array().unwrap();

        let js_assets: Vec<_> = assets
            .iter()
            .filter(|a| a["type"] == "js")
            .collect();
        assert_eq!(js_assets.len(), 1);
        assert_eq!(js_assets[0]["source"], "console.log(1)");
        assert_eq!(js_assets[0]["filename"], "index.js");

        let map_assets: Vec<_> = assets
            .iter()
            .filter(|a| a["type"] == "map")
            .collect();
        assert_eq!(map_assets.len(), 1);
        let map: Value = serde_json::from_str(map_assets[0]["source"].as_str().unwrap()).unwrap();
        for source in map["sources"].as_array().unwrap() {
            assert!(!source.as_str().unwrap().starts_with('/'));
        }
    }

    #[test]
    fn test_scenario_d_non_static_request_passes_through() {
        let context = test_context();
        let mut options = SerializerOptions::new("/project", "/project")
            .apply_request_url("http://localhost:8081/index.bundle?platform=web")
            .unwrap();
        options.dev = true;
        let params = prelude_only_params(options);

        let output = DefaultSerializer.serialize(params, &context).unwrap();
        match output {
            BundleOutput::Code(code) => assert_eq!(code, "console.log(1)"),
            _ => panic!("expected plain bundle string"),
        }
    }

    #[test]
    fn test_production_names_are_content_hashed_and_stable() {
        let context = test_context();

        let first = DefaultSerializer
            .serialize(prelude_only_params(static_options(false, false)), &context)
            .unwrap();
        let second = DefaultSerializer
            .serialize(prelude_only_params(static_options(false, false)), &context)
            .unwrap();

        let name_of = |output: &BundleOutput| -> String {
            let BundleOutput::Assets(json) = output else {
                panic!("expected asset manifest");
            };
            let assets: Value = serde_json::from_str(json).unwrap();
            assets[0]["filename"].as_str().unwrap().to_string()
        };

        let first_name = name_of(&first);
        assert!(first_name.starts_with("_expo/static/js/web/"));
        assert!(first_name.ends_with(".js"));
        assert_eq!(first_name, name_of(&second));
    }

    #[test]
    fn test_map_sources_are_relative_to_server_root() {
        let context = test_context();
        let mut graph = build_graph(
            vec![js_module("/project/src/a.js", "__d(function() {});", true)],
            &[],
        );
        // a unit map as an upstream transformer would leave it
        let map = &mut graph
            .get_module_mut(&ModuleId::new("/project/src/a.js"))
            .unwrap()
            .outputs[0]
            .map;
        map.sources = vec!["/project/src/a.js".to_string()];
        map.sources_content = vec![None];

        let mut params = test_params("/project/src/a.js", graph);
        let mut options = static_options(true, true);
        options.server_root = "/project".into();
        params.options = Arc::new(options);

        let output = DefaultSerializer.serialize(params, &context).unwrap();
        let BundleOutput::Assets(json) = output else {
            panic!("expected asset manifest");
        };
        let assets: Value = serde_json::from_str(&json).unwrap();
        let map_source = assets
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["type"] == "map")
            .unwrap()["source"]
            .as_str()
            .unwrap()
            .to_string();
        let map: Value = serde_json::from_str(&map_source).unwrap();
        assert_eq!(map["sources"][0], "src/a.js");
    }

    #[test]
    fn test_style_assets_are_appended() {
        let context = test_context();
        let mut options = static_options(true, false);
        options.style_assets = Some(Arc::new(|_, _| {
            vec![StyleAsset {
                filename: "styles.css".to_string(),
                source: ".a { color: red; }".to_string(),
            }]
        }));
        let params = prelude_only_params(options);

        let output = DefaultSerializer.serialize(params, &context).unwrap();
        let BundleOutput::Assets(json) = output else {
            panic!("expected asset manifest");
        };
        let assets: Value = serde_json::from_str(&json).unwrap();
        let css = assets
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["type"] == "css")
            .unwrap();
        assert_eq!(css["filename"], "styles.css");
        assert_eq!(css["source"], ".a { color: red; }");
    }
}
