//! Pre-order traversals.
//!
//! Traversal strategy
//! - Iterative, using an explicit stack; children are pushed in reverse so they pop in
//!   minting order.
//! - The child lists are computed once per traversal (one pass over the dictionary) instead
//!   of once per visited node.
//! - When `include_subtrees` is set, reaching an embedded subtree boundary transfers the
//!   traversal into the embedded tree: its root is visited in place of the boundary node,
//!   then its interior, as if the boundary did not exist. Otherwise the boundary is visited
//!   as an opaque leaf.
//!
//! The visitor only receives shared references, so it cannot mutate the tree being walked.
//! Write-locking an embedded tree from inside a visit of that same tree blocks forever and
//! is not supported.
use smallvec::SmallVec;

use crate::{
    id::NodeId,
    tree::{NodeContent, Tree, TreeKind},
    utils::error::TreeResult,
};

impl<K: TreeKind> Tree<K> {
    /// Visit `start` and all its descendants in pre-order.
    pub fn visit_all_from<F>(&self, start: &NodeId, include_subtrees: bool, mut visitor: F) -> TreeResult<()>
    where
        F: FnMut(&NodeId, &NodeContent<K>),
    {
        self.require(start)?;
        self.walk(start, include_subtrees, false, &mut visitor);
        Ok(())
    }

    /// Visit every node of the whole tree in pre-order.
    pub fn visit_all<F>(&self, include_subtrees: bool, visitor: F)
    where
        F: FnMut(&NodeId, &NodeContent<K>),
    {
        // The root always exists.
        let _ = self.visit_all_from(&self.root_id, include_subtrees, visitor);
    }

    /// Visit the leaves below `start` (or `start` itself if it is a leaf) in pre-order.
    ///
    /// Subtree boundaries count as leaves unless `include_subtrees` is set, in which case
    /// the leaves of the embedded tree are visited instead.
    pub fn visit_leaves_from<F>(&self, start: &NodeId, include_subtrees: bool, mut visitor: F) -> TreeResult<()>
    where
        F: FnMut(&NodeId, &NodeContent<K>),
    {
        self.require(start)?;
        self.walk(start, include_subtrees, true, &mut visitor);
        Ok(())
    }

    fn walk(
        &self,
        start: &NodeId,
        include_subtrees: bool,
        leaves_only: bool,
        visitor: &mut dyn FnMut(&NodeId, &NodeContent<K>),
    ) {
        let index = self.child_index();
        let mut stack: SmallVec<[&NodeId; 32]> = SmallVec::new();
        stack.push(start);

        while let Some(id) = stack.pop() {
            let content = &self.dictionary[id].content;
            if let (NodeContent::Subtree(handle), true) = (content, include_subtrees) {
                let guard = handle.read();
                let subtree = guard.tree();
                subtree.walk(&subtree.root_id, true, leaves_only, visitor);
                continue;
            }

            let children = index.get(id);
            let is_leaf = children.is_none_or(|children| children.is_empty());
            if !leaves_only || is_leaf {
                visitor(id, content);
            }
            if let Some(children) = children {
                stack.extend(children.iter().rev().copied());
            }
        }
    }
}
