pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod module;
pub mod module_graph;
pub mod regenerate;
pub mod serializer;
pub mod tree_shaking;

#[cfg(test)]
pub(crate) mod test_helper;

pub use config::{OutputMode, SerializerOptions};
pub use context::Context;
pub use module::{Module, ModuleId, OutputUnit};
pub use module_graph::ModuleGraph;
pub use serializer::{
    BundleOutput, DefaultSerializer, FinalSerializer, SerializerChain, SerializerParams,
    SerializerStage, TreeShakeStage,
};
pub use tree_shaking::PruneMode;
