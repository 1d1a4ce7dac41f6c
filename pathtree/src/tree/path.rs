use crate::{
    id::NodeId,
    tree::{NodeContent, Tree, TreeHandle, TreeKind},
    utils::error::TreeResult,
};

impl<K: TreeKind> Tree<K> {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.dictionary.contains_key(id)
    }

    /// Number of entries in this tree's own dictionary.
    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    /// Always false, the root is never removed.
    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }

    pub fn get_content_at(&self, id: &NodeId) -> TreeResult<&NodeContent<K>> {
        Ok(&self.require(id)?.content)
    }

    /// Payload of `id`, `None` for empty or subtree content.
    pub fn get_payload_at(&self, id: &NodeId) -> TreeResult<Option<&K::Payload>> {
        Ok(self.require(id)?.content.as_value())
    }

    /// Direct children of `id` in minting order.
    ///
    /// With `include_subtrees == false`, children that are embedded subtree boundaries are
    /// left out. With `true` the boundaries are listed, but never the interiors, which live
    /// in the embedded tree's own dictionary.
    pub fn get_children_ids_of(&self, id: &NodeId, include_subtrees: bool) -> TreeResult<Vec<NodeId>> {
        self.require(id)?;
        Ok(self.collect_sorted(|candidate| candidate.is_child_of(id), include_subtrees))
    }

    /// Every descendant of `id`, in pre-order. Same `include_subtrees` semantics as
    /// [`Tree::get_children_ids_of`].
    pub fn get_descendant_ids_of(&self, id: &NodeId, include_subtrees: bool) -> TreeResult<Vec<NodeId>> {
        self.require(id)?;
        Ok(self.collect_sorted(|candidate| candidate.is_descendant_of(id), include_subtrees))
    }

    fn collect_sorted(&self, matches: impl Fn(&NodeId) -> bool, include_subtrees: bool) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .dictionary
            .iter()
            .filter(|(candidate, record)| {
                matches(candidate) && (include_subtrees || !record.content.is_subtree())
            })
            .map(|(candidate, _)| candidate.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Parent of `id`, `None` for the root.
    pub fn get_parent_id_of(&self, id: &NodeId) -> TreeResult<Option<NodeId>> {
        self.require(id)?;
        if self.is_root(id) {
            return Ok(None);
        }
        Ok(id.parent())
    }

    /// Children of the parent of `id`, `id` excluded. Empty for the root.
    pub fn get_sibling_ids_of(&self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        let Some(parent) = self.get_parent_id_of(id)? else {
            return Ok(Vec::new());
        };
        let mut siblings = self.get_children_ids_of(&parent, true)?;
        siblings.retain(|sibling| sibling != id);
        Ok(siblings)
    }

    pub fn is_root(&self, id: &NodeId) -> bool {
        id == &self.root_id
    }

    /// Whether `id` has at least one child, embedded subtree boundaries included.
    pub fn is_branch(&self, id: &NodeId) -> TreeResult<bool> {
        self.require(id)?;
        Ok(self.dictionary.keys().any(|candidate| candidate.is_child_of(id)))
    }

    pub fn is_leaf(&self, id: &NodeId) -> TreeResult<bool> {
        self.is_branch(id).map(|branch| !branch)
    }

    /// Whether `id` is the boundary of an embedded tree.
    pub fn is_subtree(&self, id: &NodeId) -> TreeResult<bool> {
        Ok(self.require(id)?.content.is_subtree())
    }

    /// Depth of `id` relative to this tree's root, the root being at depth 0.
    pub fn depth_of(&self, id: &NodeId) -> TreeResult<usize> {
        self.require(id)?;
        Ok(id.depth() - self.root_id.depth())
    }

    /// Every identifier of this tree's own dictionary, in pre-order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.dictionary.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Identifiers of the embedded subtree boundaries, in pre-order.
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .dictionary
            .iter()
            .filter(|(_, record)| record.content.is_subtree())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of nodes. With `include_subtrees`, each boundary is replaced by the node
    /// count of the embedded tree it designates.
    pub fn count_total_nodes(&self, include_subtrees: bool) -> usize {
        self.dictionary
            .values()
            .map(|record| match (&record.content, include_subtrees) {
                (NodeContent::Subtree(handle), true) => {
                    handle.read().tree().count_total_nodes(true)
                }
                _ => 1,
            })
            .sum()
    }

    /// Handle of the tree embedded at `id`, `None` if `id` is not a subtree boundary.
    pub fn get_subtree_at(&self, id: &NodeId) -> TreeResult<Option<TreeHandle<K>>> {
        Ok(self.require(id)?.content.as_subtree().cloned())
    }
}
