use std::sync::RwLock;

use swc_core::common::sync::Lrc;
use swc_core::common::{Globals, SourceMap};

use crate::ast::comments::Comments;

/// Shared parse/emit state for one serializer invocation. A fresh context is
/// created per bundle request; nothing in here is cached across requests.
pub struct Context {
    pub cm: Lrc<SourceMap>,
    pub globals: Globals,
    pub comments: RwLock<Comments>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            cm: Default::default(),
            globals: Globals::new(),
            comments: RwLock::new(Comments::default()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
