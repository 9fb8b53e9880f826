use swc_core::base::sourcemap as swc_sourcemap;
use swc_core::common::source_map::SourceMapGenConfig;
use swc_core::common::sync::Lrc;
use swc_core::common::{BytePos, FileName, LineCol, SourceMap};

pub struct SwcSourceMapGenConfig;

impl SourceMapGenConfig for SwcSourceMapGenConfig {
    fn file_name_to_source(&self, f: &FileName) -> String {
        f.to_string()
    }

    fn inline_sources_content(&self, _f: &FileName) -> bool {
        true
    }
}

pub fn build_source_map(
    mappings: &[(BytePos, LineCol)],
    cm: &Lrc<SourceMap>,
) -> swc_sourcemap::SourceMap {
    let config = SwcSourceMapGenConfig;

    cm.build_source_map_with_config(mappings, None, config)
}

// The sourcemap::SourceMap type holds a RefCell and cannot be kept on graph
// nodes that need Clone; this raw form can.
#[derive(Clone, Default, Debug)]
pub struct RawSourceMap {
    pub file: Option<String>,
    pub tokens: Vec<swc_sourcemap::RawToken>,
    pub names: Vec<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
}

impl RawSourceMap {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.sources.is_empty()
    }
}

impl From<swc_sourcemap::SourceMap> for RawSourceMap {
    fn from(sm: swc_sourcemap::SourceMap) -> Self {
        Self {
            file: sm.get_file().map(|f| f.to_owned()),
            tokens: sm.tokens().map(|t| t.get_raw_token()).collect(),
            names: sm.names().map(|n| n.to_owned()).collect(),
            sources: sm.sources().map(|s| s.to_owned()).collect(),
            sources_content: sm
                .source_contents()
                .map(|cs| cs.map(|c| c.to_owned()))
                .collect(),
        }
    }
}

impl From<RawSourceMap> for swc_sourcemap::SourceMap {
    fn from(rsm: RawSourceMap) -> Self {
        Self::new(
            rsm.file.map(|f| f.into_boxed_str().into()),
            rsm.tokens,
            rsm.names
                .into_iter()
                .map(|n| n.into_boxed_str().into())
                .collect(),
            rsm.sources
                .into_iter()
                .map(|n| n.into_boxed_str().into())
                .collect(),
            Some(
                rsm.sources_content
                    .into_iter()
                    .map(|op_string| op_string.map(|s| s.into_boxed_str().into()))
                    .collect(),
            ),
        )
    }
}
