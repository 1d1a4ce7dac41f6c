//! Structural mutations.
//!
//! Every operation that touches several dictionary entries computes and validates the full
//! set of changes before writing any of them, so a failed call leaves the tree untouched.
use log::{debug, trace};

use crate::{
    id::NodeId,
    tree::{IdMap, NodeContent, NodeRecord, Tree, TreeHandle, TreeKind},
    utils::error::{TreeError, TreeResult},
};

impl<K: TreeKind> Tree<K> {
    /// Append a child holding `content` under `parent` and return its identifier.
    ///
    /// Subtree content is re-rooted at the new identifier and switched to this tree's
    /// counter. A handle already embedded in this tree is rejected.
    pub fn append_child(&mut self, parent: &NodeId, content: NodeContent<K>) -> TreeResult<NodeId> {
        self.require_not_boundary(parent)?;
        self.require_unembedded(&content)?;
        let id = parent.child(self.ids.next());
        let content = self.attach(content, &id);
        trace!("Appended node `{}` under `{}`", id, parent);
        self.insert_record(id.clone(), content);
        Ok(id)
    }

    /// Overwrite the content of `id`, returning the previous content.
    ///
    /// The root never holds an embedded tree, and only a leaf may become a subtree boundary.
    pub fn replace_content_at(&mut self, id: &NodeId, content: NodeContent<K>) -> TreeResult<NodeContent<K>> {
        self.require(id)?;
        if content.is_subtree() {
            if self.is_root(id) {
                return Err(TreeError::RootSubtree { id: id.clone() });
            }
            if self.is_branch(id)? {
                return Err(TreeError::SubtreeOverBranch { id: id.clone() });
            }
            self.require_unembedded(&content)?;
        }
        let content = self.attach(content, id);
        let record = self
            .dictionary
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound { id: id.clone() })?;
        Ok(std::mem::replace(&mut record.content, content))
    }

    fn require_unembedded(&self, content: &NodeContent<K>) -> TreeResult<()> {
        let Some(handle) = content.as_subtree() else {
            return Ok(());
        };
        match self.boundary_of(handle) {
            Some(id) => Err(TreeError::SubtreeAlreadyEmbedded { id }),
            None => Ok(()),
        }
    }

    /// `id` followed by every descendant, in pre-order.
    pub(crate) fn branch_ids(&self, id: &NodeId) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .dictionary
            .keys()
            .filter(|candidate| *candidate == id || candidate.is_descendant_of(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn check_relocation(&self, source: &NodeId, target: &NodeId) -> TreeResult<()> {
        self.require(source)?;
        self.require_not_boundary(target)?;
        if self.is_root(source) {
            return Err(TreeError::RootMove { id: source.clone() });
        }
        if target == source || target.is_descendant_of(source) {
            return Err(TreeError::MoveIntoDescendant {
                source_id: source.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    /// Rewrite the `from` prefix of every listed entry into `to`. Preconditions are the
    /// caller's responsibility.
    pub(crate) fn relocate(&mut self, ids: &[NodeId], from: &NodeId, to: &NodeId) -> IdMap {
        let mut mapping = IdMap::with_capacity(ids.len());
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let (Some(new_id), Some(record)) = (id.rebase(from, to), self.dictionary.remove(id)) {
                mapping.insert(id.clone(), new_id.clone());
                records.push((new_id, record));
            }
        }
        for (new_id, record) in records {
            if let NodeContent::Subtree(handle) = &record.content {
                handle.write().tree_mut().rebase_root(&new_id);
            }
            self.dictionary.insert(new_id, record);
        }
        mapping
    }

    /// Move `source` and its descendants under `target`, as a new child of `target`.
    ///
    /// Returns the old-to-new identifier mapping of every relocated node. Embedded subtrees
    /// keep their handle and are re-rooted at their new identifier.
    pub fn move_subtree(&mut self, source: &NodeId, target: &NodeId) -> TreeResult<IdMap> {
        self.check_relocation(source, target)?;
        let slot = target.child(self.ids.next());
        let ids = self.branch_ids(source);
        let mapping = self.relocate(&ids, source, &slot);
        debug!("Moved `{}` ({} nodes) to `{}`", source, mapping.len(), slot);
        Ok(mapping)
    }

    /// Move every child of `source` (with its descendants) under `target`. `source` itself
    /// stays in place, childless.
    pub fn move_children(&mut self, source: &NodeId, target: &NodeId) -> TreeResult<IdMap> {
        self.require(source)?;
        self.require_not_boundary(target)?;
        if target == source || target.is_descendant_of(source) {
            return Err(TreeError::MoveIntoDescendant {
                source_id: source.clone(),
                target: target.clone(),
            });
        }
        let mut mapping = IdMap::new();
        for child in self.get_children_ids_of(source, true)? {
            let slot = target.child(self.ids.next());
            let ids = self.branch_ids(&child);
            mapping.extend(self.relocate(&ids, &child, &slot));
        }
        debug!("Moved children of `{}` to `{}`", source, target);
        Ok(mapping)
    }

    /// Remove `id` and every descendant. Returns the removed identifiers in pre-order.
    pub fn remove_at(&mut self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        self.require(id)?;
        if self.is_root(id) {
            return Err(TreeError::RootRemoval { id: id.clone() });
        }
        let removed = self.branch_ids(id);
        for removed_id in &removed {
            self.dictionary.remove(removed_id);
        }
        debug!("Removed `{}` ({} nodes)", id, removed.len());
        Ok(removed)
    }

    /// Graft the branch of `source` rooted at `source_root` (default: its root) under
    /// `target`.
    ///
    /// A fresh child slot of `target` is minted and every grafted identifier is rewritten
    /// by substituting the `source_root` prefix with that slot. The counter is then
    /// advanced past every numeric segment of the grafted suffixes. Embedded subtrees of the
    /// source are deep-copied, so `source` is left untouched. Returns the mapping from source
    /// identifiers to their identifiers in this tree.
    pub fn append_tree_at(
        &mut self,
        target: &NodeId,
        source: &Tree<K>,
        source_root: Option<&NodeId>,
    ) -> TreeResult<IdMap> {
        self.require_not_boundary(target)?;
        let source_root = source_root.unwrap_or(&source.root_id);
        source.require(source_root)?;

        let slot = target.child(self.ids.next());
        let mut mapping = IdMap::new();
        for id in source.branch_ids(source_root) {
            if let Some(new_id) = id.rebase(source_root, &slot) {
                if self.dictionary.contains_key(&new_id) {
                    return Err(TreeError::IdCollision { id: new_id });
                }
                mapping.insert(id, new_id);
            }
        }

        if let Some(highest) = mapping
            .values()
            .filter_map(|new_id| new_id.highest_segment_below(&slot))
            .max()
        {
            self.ids.ensure_above(highest);
        }

        for (old_id, new_id) in &mapping {
            let content = match &source.dictionary[old_id].content {
                NodeContent::Subtree(handle) => {
                    let mut copy = handle.read().tree().deep_clone_sharing(&self.ids);
                    copy.rebase_root(new_id);
                    copy.adopt_generator(&self.ids);
                    NodeContent::Subtree(TreeHandle::new(K::from_tree(copy)))
                }
                other => other.clone(),
            };
            self.dictionary.insert(new_id.clone(), NodeRecord::new(content));
        }
        debug!(
            "Grafted {} nodes from `{}` under `{}` at `{}`",
            mapping.len(),
            source_root,
            target,
            slot
        );
        Ok(mapping)
    }

    /// Embed a new, empty tree of the same kind as a fresh child of `parent`.
    ///
    /// The embedded tree is rooted at the identifier of its slot and shares this tree's
    /// counter. The returned handle is the one stored in the slot, so
    /// `tree.get_content_at(&handle.root_id())` designates the very same instance.
    pub fn create_subtree_at(&mut self, parent: &NodeId) -> TreeResult<TreeHandle<K>> {
        self.require_not_boundary(parent)?;
        let slot = parent.child(self.ids.next());
        let subtree = Tree::with_root(slot.clone(), None, self.ids.clone());
        let handle = TreeHandle::new(K::from_tree(subtree));
        debug!("Embedded a subtree at `{}`", slot);
        self.insert_record(slot, NodeContent::Subtree(handle.clone()));
        Ok(handle)
    }
}
