use std::collections::{HashMap, HashSet};

use crate::model::span::CanonicalSpan;

/// Parent/child index over a flat span list, rebuilt per render call.
///
/// A span is a root when it has no parent id, or when its parent id does not
/// appear among the input span ids; the latter keeps partial or filtered
/// span sets renderable instead of dropping subtrees. Both `roots` and each
/// child list preserve the relative order of the input; rendering order is
/// behaviorally significant for the hierarchy and summary formats.
pub struct SpanTree<'a> {
    pub roots: Vec<&'a CanonicalSpan>,
    children: HashMap<&'a str, Vec<&'a CanonicalSpan>>,
}

impl<'a> SpanTree<'a> {
    pub fn build(spans: &'a [CanonicalSpan]) -> Self {
        let known_ids: HashSet<&str> = spans.iter().map(|s| s.span_id.as_str()).collect();

        let mut roots = Vec::new();
        let mut children: HashMap<&str, Vec<&CanonicalSpan>> = HashMap::new();

        for span in spans {
            match span.parent_id.as_deref() {
                Some(parent) if span.has_parent() && known_ids.contains(parent) => {
                    children.entry(parent).or_default().push(span);
                }
                _ => roots.push(span),
            }
        }

        Self { roots, children }
    }

    pub fn children_of(&self, span_id: &str) -> &[&'a CanonicalSpan] {
        self.children
            .get(span_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
