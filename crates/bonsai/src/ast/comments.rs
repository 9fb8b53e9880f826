use swc_core::common::comments::{Comment, CommentKind};
use swc_core::common::{BytePos, Span, DUMMY_SP};
use swc_node_comments::SwcComments;

#[derive(Default, Clone)]
pub struct Comments(SwcComments);

impl Comments {
    pub fn get_swc_comments(&self) -> &SwcComments {
        &self.0
    }

    pub fn add_unused_comment(&mut self, pos: BytePos) {
        let mut leading = self.0.leading.entry(pos).or_default();
        let unused_comment = Comment {
            kind: CommentKind::Block,
            span: DUMMY_SP,
            text: "#__UNUSED__".into(),
        };

        if !leading.iter().any(|c| c.text == unused_comment.text) {
            leading.push(unused_comment);
        }
    }

    /**
     * Check for `/*#__UNUSED__*/`
     */
    pub fn has_unused(&self, span: Span) -> bool {
        self.has_flag(span, "UNUSED")
    }

    fn has_flag(&self, span: Span, text: &'static str) -> bool {
        self.find_comment(span, |c| {
            c.kind == CommentKind::Block
                && c.text.len() == (text.len() + 5)
                && (c.text.starts_with("#__") || c.text.starts_with("@__"))
                && c.text.ends_with("__")
                && text == &c.text[3..c.text.len() - 2]
        })
    }

    fn find_comment<F>(&self, span: Span, mut op: F) -> bool
    where
        F: FnMut(&Comment) -> bool,
    {
        let mut found = false;
        let cs = self.0.leading.get(&span.lo);
        if let Some(cs) = cs {
            for c in cs.iter() {
                found |= op(c);
                if found {
                    break;
                }
            }
        }

        found
    }
}
