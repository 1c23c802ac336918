// ABOUTME: Pre-order enter/exit numbering over a document subtree.
// ABOUTME: Answers ancestor and descendant questions in constant time after one walk.

use std::collections::HashMap;

use super::tree::{Document, NodeId};

/// Enter/exit ranges for every node under a scope, computed once.
///
/// Only valid until the tree is next mutated.
#[derive(Debug, Default)]
pub struct PreorderIndex {
    ranges: HashMap<NodeId, (usize, usize)>,
}

impl PreorderIndex {
    pub fn build(doc: &Document, scope: NodeId) -> Self {
        let mut ranges = HashMap::new();
        let mut counter = 0usize;
        // (node, children_pushed)
        let mut stack = vec![(scope, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if let Some((_, exit)) = ranges.get_mut(&id) {
                    *exit = counter;
                }
                continue;
            }
            ranges.insert(id, (counter, counter));
            counter += 1;
            stack.push((id, true));
            for &child in doc.children(id).iter().rev() {
                stack.push((child, false));
            }
        }

        Self { ranges }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ranges.contains_key(&id)
    }

    /// True if `inner` is `outer` or lies inside it.
    pub fn is_inclusive_descendant(&self, outer: NodeId, inner: NodeId) -> bool {
        match (self.ranges.get(&outer), self.ranges.get(&inner)) {
            (Some(&(o_enter, o_exit)), Some(&(i_enter, _))) => o_enter <= i_enter && i_enter < o_exit,
            _ => false,
        }
    }

    /// True if `a` is an ancestor of `b`, `b` an ancestor of `a`, or they are equal.
    pub fn related(&self, a: NodeId, b: NodeId) -> bool {
        self.is_inclusive_descendant(a, b) || self.is_inclusive_descendant(b, a)
    }
}
