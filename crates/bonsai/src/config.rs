use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::module::{Module, ModuleId};
use crate::module_graph::ModuleGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Static,
}

/// A style artifact supplied by the external extractor collaborator; emitted
/// verbatim into the static-export manifest.
#[derive(Debug, Clone, Serialize)]
pub struct StyleAsset {
    pub filename: String,
    pub source: String,
}

pub type ModuleIdFn = Arc<dyn Fn(&ModuleId) -> u64 + Send + Sync>;
pub type ModuleFilterFn = Arc<dyn Fn(&Module) -> bool + Send + Sync>;
pub type StyleAssetsFn =
    Arc<dyn Fn(&ModuleGraph, &SerializerOptions) -> Vec<StyleAsset> + Send + Sync>;

/// Per-request options consumed by the serializer chain. Built from the
/// request URL plus caller-supplied roots and callbacks.
pub struct SerializerOptions {
    pub platform: Option<String>,
    pub output_mode: OutputMode,
    pub include_maps: bool,
    pub dev: bool,
    pub project_root: PathBuf,
    pub server_root: PathBuf,
    pub module_id_for: ModuleIdFn,
    pub module_filter: Option<ModuleFilterFn>,
    pub tree_shaking: bool,
    /// Consumed by a sibling stage; carried here untouched.
    pub client_env_injection: bool,
    pub style_assets: Option<StyleAssetsFn>,
}

impl SerializerOptions {
    pub fn new(project_root: impl Into<PathBuf>, server_root: impl Into<PathBuf>) -> Self {
        Self {
            platform: None,
            output_mode: OutputMode::Plain,
            include_maps: false,
            dev: false,
            project_root: project_root.into(),
            server_root: server_root.into(),
            module_id_for: default_module_id_factory(),
            module_filter: None,
            tree_shaking: true,
            client_env_injection: true,
            style_assets: None,
        }
    }

    /// Read `platform`, `serializer.output` and `serializer.map` from the
    /// request URL. The URL may arrive in a transport-safe percent-encoded
    /// wrapping and is normalized first.
    pub fn apply_request_url(mut self, raw_url: &str) -> Result<Self> {
        let normalized = normalize_request_url(raw_url);
        let url = Url::parse(&normalized)
            .map_err(|e| anyhow!("invalid request url {:?}: {}", raw_url, e))?;

        for (key, value) in url.query_pairs() {
            match &*key {
                "platform" => self.platform = Some(value.to_string()),
                "serializer.output" => {
                    if value == "static" {
                        self.output_mode = OutputMode::Static;
                    }
                }
                "serializer.map" => self.include_maps = value == "true",
                _ => {}
            }
        }
        Ok(self)
    }

    pub fn is_static_export(&self) -> bool {
        self.output_mode == OutputMode::Static && self.platform.as_deref() == Some("web")
    }
}

/// Undo one level of transport encoding when the scheme separator itself
/// arrives percent-encoded.
fn normalize_request_url(raw: &str) -> String {
    if !raw.contains("://") && raw.contains("%3A%2F%2F") {
        return percent_decode_str(raw).decode_utf8_lossy().to_string();
    }
    raw.to_string()
}

/// Numbers modules in first-seen order; repeated lookups are stable within
/// one request.
pub fn default_module_id_factory() -> ModuleIdFn {
    let ids: Mutex<IndexMap<ModuleId, u64>> = Mutex::new(IndexMap::new());
    Arc::new(move |module_id: &ModuleId| {
        let mut ids = ids.lock().unwrap();
        let next = ids.len() as u64;
        *ids.entry(module_id.clone()).or_insert(next)
    })
}
