//! Expression trees exposed through opaque keys.
//!
//! [`ObfuscatedExpressionTree`] wraps an [`ExpressionTree`] and never lets a real
//! [`NodeId`] out: every node is registered in a [`KeyStore`] under a random key, methods
//! take and return keys, and documents exported with
//! [`ObfuscatedExpressionTree::to_pojo_at`] are re-keyed as well.
//!
//! Keys are stable: a node keeps its key when a move, graft or collapse re-keys it
//! internally. When a node disappears (removal, or a sibling collapsed into its parent)
//! its key is forgotten and resolving it fails with [`TreeError::UnknownKey`].
//!
//! Each embedded subtree is wrapped on its own, with its own store. The key of a boundary in
//! the embedding tree and the root key of the embedded tree are unrelated.
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::debug;
use strum::EnumIs;

use crate::{
    expression::{ExpressionTree, Predicate},
    id::NodeId,
    keystore::{KeyStore, KeyStyle},
    tree::{IdMap, NodeContent, TreeHandle, TreeKind, pojo::PojoDocument},
    utils::{
        conf::TreeConfig,
        error::{TreeError, TreeResult},
    },
};

/// Node content as seen from key space.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum ExposedContent {
    Empty,
    Value(Predicate),
    /// Boundary of an embedded tree, designated by the root key of its wrapper. `None` when
    /// the tree was embedded through the inner handle and has no wrapper yet.
    Subtree { root_key: Option<String> },
}

/// Outcome of [`ObfuscatedExpressionTree::append_with_junction`], in key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedJunctionAppend {
    pub is_new_branch: bool,
    pub junction_key: String,
    pub original_content_key: Option<String>,
    pub new_node_key: String,
}

/// Outcome of [`ObfuscatedExpressionTree::append_tree_at`], in key space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyedGraft {
    /// Source key to key of the grafted copy.
    pub grafted: IndexMap<String, String>,
    /// Key of the target's previous content when the target was a promoted leaf.
    pub promoted: Option<String>,
}

#[derive(Debug)]
pub struct ObfuscatedExpressionTree {
    inner: TreeHandle<ExpressionTree>,
    keys: KeyStore<NodeId>,
    subtrees: HashMap<TreeHandle<ExpressionTree>, ObfuscatedExpressionTree>,
    root_key: String,
    /// Root identifier at the last synchronisation, to detect re-rooting from outside.
    last_root: NodeId,
}

impl ObfuscatedExpressionTree {
    pub fn new(tree: ExpressionTree) -> Self {
        Self::from_handle(TreeHandle::new(tree), KeyStyle::default())
    }

    pub fn with_style(tree: ExpressionTree, style: KeyStyle) -> Self {
        Self::from_handle(TreeHandle::new(tree), style)
    }

    /// Wrap a shared tree. Every node present is registered under a fresh key.
    pub fn from_handle(inner: TreeHandle<ExpressionTree>, style: KeyStyle) -> Self {
        let root_id = inner.root_id();
        let mut keys = KeyStore::with_style(style);
        let root_key = keys.put(root_id.clone());
        let mut wrapper = Self {
            inner,
            keys,
            subtrees: HashMap::new(),
            root_key,
            last_root: root_id,
        };
        wrapper.sync(&IdMap::new());
        wrapper
    }

    /// Import a document, exported by any tree, and wrap the result.
    pub fn from_pojo(document: &PojoDocument<Option<Predicate>>) -> TreeResult<Self> {
        Self::from_pojo_with_config(document, &TreeConfig::default())
    }

    pub fn from_pojo_with_config(
        document: &PojoDocument<Option<Predicate>>,
        config: &TreeConfig,
    ) -> TreeResult<Self> {
        let tree = ExpressionTree::from_pojo_with_config(document, config)?;
        Ok(Self::with_style(tree, config.key_style))
    }

    /// The wrapped tree. Whoever mutates it directly must not expect keys to follow.
    pub fn inner_handle(&self) -> &TreeHandle<ExpressionTree> {
        &self.inner
    }

    pub fn key_style(&self) -> KeyStyle {
        self.keys.style()
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// Number of keys currently registered in this tree's own store.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn resolve(&self, key: &str) -> TreeResult<NodeId> {
        self.keys.lookup_or_unknown(key).cloned()
    }

    /// Key of a real identifier. Failures never carry the identifier itself.
    fn key_of(&self, id: &NodeId) -> TreeResult<String> {
        match self.keys.reverse_lookup_exactly_one(id) {
            Ok(key) => Ok(key.to_string()),
            Err(TreeError::AmbiguousKey { keys, .. }) => Err(TreeError::AmbiguousKey {
                value: keys.first().cloned().unwrap_or_default(),
                keys,
            }),
            Err(_) => Err(TreeError::UnregisteredNode),
        }
    }

    /// Real identifier to key, for this tree only.
    fn key_table(&self) -> HashMap<NodeId, String> {
        self.keys
            .iter()
            .map(|(key, id)| (id.clone(), key.to_string()))
            .collect()
    }

    /// Real identifier to key for this tree and, recursively, its embedded trees. A
    /// boundary resolves to the root key of the embedded tree.
    fn deep_key_table(&self, table: &mut HashMap<NodeId, String>) {
        table.extend(self.key_table());
        for subtree in self.subtrees.values() {
            subtree.deep_key_table(table);
        }
    }

    fn expose(&self, content: &NodeContent<ExpressionTree>) -> ExposedContent {
        match content {
            NodeContent::Empty => ExposedContent::Empty,
            NodeContent::Value(predicate) => ExposedContent::Value(predicate.clone()),
            NodeContent::Subtree(handle) => ExposedContent::Subtree {
                root_key: self
                    .subtrees
                    .get(handle)
                    .map(|subtree| subtree.root_key.clone()),
            },
        }
    }

    /// Rewrite the identifiers carried by `err` into keys.
    fn conceal(&self, err: TreeError) -> TreeError {
        let table = self.key_table();
        let hide = |id: NodeId| match table.get(&id) {
            Some(key) => NodeId::new(key.clone()),
            None => id,
        };
        match err {
            TreeError::NodeNotFound { id } => TreeError::NodeNotFound { id: hide(id) },
            TreeError::RootRemoval { id } => TreeError::RootRemoval { id: hide(id) },
            TreeError::RootMove { id } => TreeError::RootMove { id: hide(id) },
            TreeError::RootSubtree { id } => TreeError::RootSubtree { id: hide(id) },
            TreeError::SubtreeBoundary { id } => TreeError::SubtreeBoundary { id: hide(id) },
            TreeError::SubtreeOverBranch { id } => TreeError::SubtreeOverBranch { id: hide(id) },
            TreeError::SubtreeAlreadyEmbedded { id } => TreeError::SubtreeAlreadyEmbedded { id: hide(id) },
            TreeError::IdCollision { id } => TreeError::IdCollision { id: hide(id) },
            TreeError::MoveIntoDescendant { source_id, target } => TreeError::MoveIntoDescendant {
                source_id: hide(source_id),
                target: hide(target),
            },
            TreeError::SingleChildBranch { id, children } => TreeError::SingleChildBranch {
                id: hide(id),
                children: children.into_iter().map(hide).collect(),
            },
            other => other,
        }
    }

    /// Drop the keys of nodes that no longer exist, before [`Self::sync`] re-homes the
    /// relocated ones. A removed identifier may be reused by a relocated node.
    fn forget(&mut self, removed: &[NodeId]) {
        let removed: HashSet<&NodeId> = removed.iter().collect();
        self.keys.retain(|_, id| !removed.contains(id));
    }

    /// Bring keys and subtree wrappers back in line with the inner tree after a mutation.
    ///
    /// `relocated` maps identifiers whose node survived under a new identifier. A relocated
    /// node keeps its key, unless its new identifier already belongs to a surviving node, in
    /// which case the relocated key is dropped.
    fn sync(&mut self, relocated: &IdMap) {
        let guard = self.inner.read();

        let root = guard.root_id().clone();
        if root != self.last_root {
            let old_root = std::mem::replace(&mut self.last_root, root.clone());
            self.keys
                .map_values(|id| id.rebase(&old_root, &root).unwrap_or_else(|| id.clone()));
        }

        let mut moves = Vec::new();
        for (old_id, new_id) in relocated {
            let occupied = !relocated.contains_key(new_id) && !self.keys.reverse_lookup(new_id).is_empty();
            for key in self.keys.reverse_lookup(old_id) {
                moves.push((key.to_string(), (!occupied).then(|| new_id.clone())));
            }
        }
        for (key, new_id) in moves {
            match new_id {
                // The key was just read from the store.
                Some(new_id) => {
                    let _ = self.keys.replace_value(&key, new_id);
                }
                None => {
                    self.keys.remove(&key);
                }
            }
        }

        self.keys.retain(|_, id| guard.contains(id));
        let known: HashSet<NodeId> = self.keys.iter().map(|(_, id)| id.clone()).collect();
        for id in guard.node_ids() {
            if !known.contains(&id) {
                self.keys.put(id);
            }
        }

        let mut previous = std::mem::take(&mut self.subtrees);
        let style = self.keys.style();
        for id in guard.subtree_ids() {
            let Ok(Some(handle)) = guard.get_subtree_at(&id) else {
                continue;
            };
            let wrapper = match previous.remove(&handle) {
                Some(mut wrapper) => {
                    wrapper.sync(&IdMap::new());
                    wrapper
                }
                None => Self::from_handle(handle.clone(), style),
            };
            self.subtrees.insert(handle, wrapper);
        }
    }

    pub fn get_content_at(&self, key: &str) -> TreeResult<ExposedContent> {
        let id = self.resolve(key)?;
        let guard = self.inner.read();
        let content = guard.get_content_at(&id).map_err(|err| self.conceal(err))?;
        Ok(self.expose(content))
    }

    pub fn get_children_keys_of(&self, key: &str, include_subtrees: bool) -> TreeResult<Vec<String>> {
        let id = self.resolve(key)?;
        let children = self
            .inner
            .read()
            .get_children_ids_of(&id, include_subtrees)
            .map_err(|err| self.conceal(err))?;
        children.iter().map(|child| self.key_of(child)).collect()
    }

    pub fn get_descendant_keys_of(&self, key: &str, include_subtrees: bool) -> TreeResult<Vec<String>> {
        let id = self.resolve(key)?;
        let descendants = self
            .inner
            .read()
            .get_descendant_ids_of(&id, include_subtrees)
            .map_err(|err| self.conceal(err))?;
        descendants.iter().map(|descendant| self.key_of(descendant)).collect()
    }

    pub fn parent_key_of(&self, key: &str) -> TreeResult<Option<String>> {
        let id = self.resolve(key)?;
        let parent = self
            .inner
            .read()
            .get_parent_id_of(&id)
            .map_err(|err| self.conceal(err))?;
        parent.map(|parent| self.key_of(&parent)).transpose()
    }

    pub fn is_root(&self, key: &str) -> TreeResult<bool> {
        let id = self.resolve(key)?;
        Ok(self.inner.read().is_root(&id))
    }

    pub fn is_leaf(&self, key: &str) -> TreeResult<bool> {
        let id = self.resolve(key)?;
        self.inner.read().is_leaf(&id).map_err(|err| self.conceal(err))
    }

    pub fn is_branch(&self, key: &str) -> TreeResult<bool> {
        let id = self.resolve(key)?;
        self.inner.read().is_branch(&id).map_err(|err| self.conceal(err))
    }

    pub fn is_subtree(&self, key: &str) -> TreeResult<bool> {
        let id = self.resolve(key)?;
        self.inner.read().is_subtree(&id).map_err(|err| self.conceal(err))
    }

    /// Append a child holding `content` (`None` for an empty placeholder) and return its key.
    pub fn append_child(&mut self, parent_key: &str, content: Option<Predicate>) -> TreeResult<String> {
        let parent = self.resolve(parent_key)?;
        let result = self
            .inner
            .write()
            .append_child(&parent, NodeContent::from_option(content));
        let id = result.map_err(|err| self.conceal(err))?;
        self.sync(&IdMap::new());
        self.key_of(&id)
    }

    /// Overwrite the content of a node, returning what it held before.
    pub fn replace_content_at(&mut self, key: &str, content: Option<Predicate>) -> TreeResult<ExposedContent> {
        let id = self.resolve(key)?;
        let result = self
            .inner
            .write()
            .replace_content_at(&id, NodeContent::from_option(content));
        let previous = result.map_err(|err| self.conceal(err))?;
        let exposed = self.expose(&previous);
        self.sync(&IdMap::new());
        Ok(exposed)
    }

    pub fn append_with_junction(
        &mut self,
        parent_key: &str,
        junction: Predicate,
        content: Predicate,
    ) -> TreeResult<KeyedJunctionAppend> {
        let parent = self.resolve(parent_key)?;
        let result = self
            .inner
            .write()
            .append_with_junction(&parent, junction, content);
        let outcome = result.map_err(|err| self.conceal(err))?;
        self.sync(&IdMap::new());
        Ok(KeyedJunctionAppend {
            is_new_branch: outcome.is_new_branch,
            junction_key: self.key_of(&outcome.junction_id)?,
            original_content_key: outcome
                .original_content_id
                .map(|id| self.key_of(&id))
                .transpose()?,
            new_node_key: self.key_of(&outcome.new_node_id)?,
        })
    }

    /// Graft a copy of `source` (or of its branch at `source_root_key`) under `target_key`.
    ///
    /// `source` may wrap the very same tree; it is copied before this tree is locked.
    pub fn append_tree_at(
        &mut self,
        target_key: &str,
        source: &ObfuscatedExpressionTree,
        source_root_key: Option<&str>,
    ) -> TreeResult<KeyedGraft> {
        let target = self.resolve(target_key)?;
        let source_root = source_root_key.map(|key| source.resolve(key)).transpose()?;
        let copy = {
            let guard = source.inner.read();
            let mut copy = ExpressionTree::from_tree(guard.deep_clone());
            copy.set_default_junction(guard.default_junction());
            copy
        };

        let result = self
            .inner
            .write()
            .append_tree_at(&target, &copy, source_root.as_ref());
        let graft = result.map_err(|err| self.conceal(err))?;
        self.sync(&IdMap::new());

        let mut grafted = IndexMap::with_capacity(graft.grafted.len());
        for (old_id, new_id) in &graft.grafted {
            grafted.insert(source.key_of(old_id)?, self.key_of(new_id)?);
        }
        let promoted = graft.promoted.map(|id| self.key_of(&id)).transpose()?;
        debug!("Grafted {} keyed nodes", grafted.len());
        Ok(KeyedGraft { grafted, promoted })
    }

    /// Move a node and its descendants under `target_key`. Every key stays valid.
    pub fn move_subtree(&mut self, source_key: &str, target_key: &str) -> TreeResult<()> {
        let source = self.resolve(source_key)?;
        let target = self.resolve(target_key)?;
        let result = self.inner.write().move_subtree(&source, &target);
        let relocated = result.map_err(|err| self.conceal(err))?;
        self.sync(&relocated);
        Ok(())
    }

    /// Remove a node the way [`ExpressionTree::remove_at`] does. Returns every key that
    /// became invalid, including the key of a sibling collapsed into its parent.
    pub fn remove_at(&mut self, key: &str) -> TreeResult<Vec<String>> {
        let id = self.resolve(key)?;
        let before: Vec<String> = self.keys.keys().map(str::to_string).collect();
        let result = self.inner.write().remove_at(&id);
        let removal = result.map_err(|err| self.conceal(err))?;
        self.forget(&removal.removed);
        self.sync(&removal.relocated);
        Ok(before
            .into_iter()
            .filter(|key| !self.keys.contains_key(key))
            .collect())
    }

    /// Independent copy of the branch at `key`, with keys of its own.
    pub fn clone_at(&self, key: &str) -> TreeResult<ObfuscatedExpressionTree> {
        let id = self.resolve(key)?;
        let copy = self
            .inner
            .read()
            .clone_at(&id)
            .map_err(|err| self.conceal(err))?;
        Ok(Self::with_style(copy, self.keys.style()))
    }

    /// Embed a new, empty expression tree under `parent_key`. Returns the key of the
    /// boundary node; the embedded tree is reached through
    /// [`ObfuscatedExpressionTree::subtree_at`].
    pub fn create_subtree_at(&mut self, parent_key: &str) -> TreeResult<String> {
        let parent = self.resolve(parent_key)?;
        let result = self.inner.write().create_subtree_at(&parent);
        let handle = result.map_err(|err| self.conceal(err))?;
        self.sync(&IdMap::new());
        self.key_of(&handle.root_id())
    }

    /// Wrapper of the tree embedded at `key`, `None` if `key` is not a boundary.
    pub fn subtree_at(&self, key: &str) -> TreeResult<Option<&ObfuscatedExpressionTree>> {
        let handle = self.subtree_handle(key)?;
        Ok(handle.and_then(|handle| self.subtrees.get(&handle)))
    }

    pub fn subtree_at_mut(&mut self, key: &str) -> TreeResult<Option<&mut ObfuscatedExpressionTree>> {
        let handle = self.subtree_handle(key)?;
        Ok(handle.and_then(|handle| self.subtrees.get_mut(&handle)))
    }

    fn subtree_handle(&self, key: &str) -> TreeResult<Option<TreeHandle<ExpressionTree>>> {
        let id = self.resolve(key)?;
        self.inner
            .read()
            .get_subtree_at(&id)
            .map_err(|err| self.conceal(err))
    }

    /// Visit every node in pre-order with its key. With `include_subtrees`, embedded trees
    /// are entered and their nodes reported with their own keys, the boundary being replaced
    /// by the embedded root.
    pub fn visit_all<F>(&self, include_subtrees: bool, mut visitor: F)
    where
        F: FnMut(&str, &ExposedContent),
    {
        self.visit_keys(include_subtrees, &mut visitor);
    }

    fn visit_keys(&self, include_subtrees: bool, visitor: &mut dyn FnMut(&str, &ExposedContent)) {
        let table = self.key_table();
        let guard = self.inner.read();
        for id in guard.node_ids() {
            let (Some(key), Ok(content)) = (table.get(&id), guard.get_content_at(&id)) else {
                continue;
            };
            match (content, include_subtrees) {
                (NodeContent::Subtree(handle), true) => {
                    if let Some(subtree) = self.subtrees.get(handle) {
                        subtree.visit_keys(true, visitor);
                    }
                }
                _ => visitor(key, &self.expose(content)),
            }
        }
    }

    /// Export the branch at `key` with every document key and `parentId` in key space.
    /// Embedded trees are flattened with their own keys.
    pub fn to_pojo_at(&self, key: &str) -> TreeResult<PojoDocument<Option<Predicate>>> {
        let id = self.resolve(key)?;
        let document = self
            .inner
            .read()
            .to_pojo_at(&id)
            .map_err(|err| self.conceal(err))?;

        let mut table = HashMap::new();
        self.deep_key_table(&mut table);
        let translate = |raw: &str| {
            table
                .get(&NodeId::from(raw))
                .cloned()
                .ok_or_else(|| TreeError::UnknownKey { key: raw.to_string() })
        };
        let mut keyed = PojoDocument::with_capacity(document.len());
        for (raw, mut entry) in document {
            entry.parent_id = translate(&entry.parent_id)?;
            keyed.insert(translate(&raw)?, entry);
        }
        Ok(keyed)
    }

    /// Check the "no single child" invariant. Offending nodes are reported by key.
    pub fn validate_tree(&self) -> TreeResult<()> {
        let result = self.inner.read().validate_tree();
        result.map_err(|err| match err {
            TreeError::SingleChildBranch { id, children } => {
                let mut table = HashMap::new();
                self.deep_key_table(&mut table);
                let hide = |id: NodeId| match table.get(&id) {
                    Some(key) => NodeId::new(key.clone()),
                    None => id,
                };
                TreeError::SingleChildBranch {
                    id: hide(id),
                    children: children.into_iter().map(hide).collect(),
                }
            }
            other => self.conceal(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(subject: &str) -> Predicate {
        Predicate::operand(subject, "$eq", 1)
    }

    fn sample() -> ObfuscatedExpressionTree {
        let mut tree = ExpressionTree::with_root(Predicate::or());
        let root = tree.root_id().clone();
        let a = tree.append_child(&root, NodeContent::Value(Predicate::and())).unwrap();
        tree.append_child(&a, NodeContent::Value(operand("a0"))).unwrap();
        tree.append_child(&a, NodeContent::Value(operand("a1"))).unwrap();
        tree.append_child(&root, NodeContent::Value(operand("b"))).unwrap();
        ObfuscatedExpressionTree::new(tree)
    }

    #[test]
    fn keys_never_equal_real_ids() {
        let tree = sample();
        let ids = tree.inner_handle().read().node_ids();
        assert_eq!(tree.key_count(), ids.len());
        tree.visit_all(false, |key, _| {
            assert!(ids.iter().all(|id| id.as_str() != key));
        });
        assert_ne!(tree.root_key(), "_root_");
    }

    #[test]
    fn unknown_keys_are_reported() {
        let tree = sample();
        let err = tree.get_content_at("_root_").unwrap_err();
        assert!(err.kind().is_unknown_key());
    }

    #[test]
    fn unregistered_nodes_are_not_named() {
        let tree = sample();
        let root = tree.root_key().to_string();
        let root_id = tree.inner_handle().root_id();
        tree.inner_handle()
            .write()
            .append_child(&root_id, NodeContent::Value(operand("hidden")))
            .unwrap();

        let err = tree.get_children_keys_of(&root, true).unwrap_err();
        assert!(err.is_unregistered_node());
        assert!(err.kind().is_unknown_key());
        assert!(!err.to_string().contains("_root_"));
    }

    #[test]
    fn keys_survive_moves() {
        let mut tree = sample();
        let root = tree.root_key().to_string();
        let children = tree.get_children_keys_of(&root, true).unwrap();
        let (a, b) = (children[0].clone(), children[1].clone());
        let a_children = tree.get_children_keys_of(&a, true).unwrap();

        tree.move_subtree(&a_children[0], &b).unwrap();
        assert_eq!(tree.parent_key_of(&a_children[0]).unwrap(), Some(b.clone()));
        assert_eq!(
            tree.get_content_at(&a_children[0]).unwrap(),
            ExposedContent::Value(operand("a0"))
        );
    }

    #[test]
    fn collapse_keeps_parent_key_and_drops_sibling_key() {
        let mut tree = sample();
        let root = tree.root_key().to_string();
        let a = tree.get_children_keys_of(&root, true).unwrap()[0].clone();
        let a_children = tree.get_children_keys_of(&a, true).unwrap();

        let invalid = tree.remove_at(&a_children[0]).unwrap();
        assert_eq!(invalid.len(), 2);
        assert!(invalid.contains(&a_children[0]) && invalid.contains(&a_children[1]));
        assert_eq!(tree.get_content_at(&a).unwrap(), ExposedContent::Value(operand("a1")));
        assert!(tree.is_leaf(&a).unwrap());
    }

    #[test]
    fn subtrees_have_their_own_keys() {
        let mut tree = sample();
        let root = tree.root_key().to_string();
        let boundary = tree.create_subtree_at(&root).unwrap();
        assert!(tree.is_subtree(&boundary).unwrap());

        let sub_root = {
            let subtree = tree.subtree_at_mut(&boundary).unwrap().unwrap();
            let sub_root = subtree.root_key().to_string();
            subtree.replace_content_at(&sub_root, Some(Predicate::and())).unwrap();
            subtree.append_child(&sub_root, Some(operand("s0"))).unwrap();
            subtree.append_child(&sub_root, Some(operand("s1"))).unwrap();
            sub_root
        };
        assert_ne!(sub_root, boundary);
        assert!(tree.get_content_at(&sub_root).is_err());
        assert_eq!(
            tree.get_content_at(&boundary).unwrap(),
            ExposedContent::Subtree { root_key: Some(sub_root.clone()) }
        );

        let mut visited = Vec::new();
        tree.visit_all(true, |key, _| visited.push(key.to_string()));
        assert_eq!(visited.len(), 8);
        assert!(visited.contains(&sub_root));
        assert!(!visited.contains(&boundary));
    }

    #[test]
    fn exported_documents_are_keyed() {
        let mut tree = sample();
        let root = tree.root_key().to_string();
        let boundary = tree.create_subtree_at(&root).unwrap();
        {
            let subtree = tree.subtree_at_mut(&boundary).unwrap().unwrap();
            let sub_root = subtree.root_key().to_string();
            subtree.append_child(&sub_root, Some(operand("s0"))).unwrap();
            subtree.append_child(&sub_root, Some(operand("s1"))).unwrap();
        }

        let document = tree.to_pojo_at(&root).unwrap();
        assert_eq!(document.len(), 8);
        assert!(document.keys().all(|key| !key.starts_with("_root_")));
        assert!(document.values().all(|entry| document.contains_key(&entry.parent_id)));
        assert_eq!(document[root.as_str()].parent_id, root);

        let restored = ObfuscatedExpressionTree::from_pojo(&document).unwrap();
        assert_eq!(restored.inner_handle().read().count_total_nodes(true), 8);
    }

    #[test]
    fn graft_from_a_wrapper_of_the_same_tree() {
        let mut tree = sample();
        let root = tree.root_key().to_string();
        let b = tree.get_children_keys_of(&root, true).unwrap()[1].clone();
        let before = tree.key_count();

        let other = ObfuscatedExpressionTree::from_handle(tree.inner_handle().clone(), KeyStyle::Hyphenated);
        let graft = tree.append_tree_at(&b, &other, None).unwrap();
        assert!(graft.grafted.keys().all(|key| other.get_content_at(key).is_ok()));
        assert_eq!(graft.grafted.len(), 5);
        assert!(graft.promoted.is_some());
        assert_eq!(tree.key_count(), before + 6);
        tree.validate_tree().unwrap();
    }

    #[test]
    fn validation_errors_use_keys() {
        let mut tree = ObfuscatedExpressionTree::new(ExpressionTree::with_root(Predicate::and()));
        let root = tree.root_key().to_string();
        let only = tree.append_child(&root, Some(operand("a"))).unwrap();
        match tree.validate_tree().unwrap_err() {
            TreeError::SingleChildBranch { id, children } => {
                assert_eq!(id.as_str(), root);
                assert_eq!(children, vec![NodeId::new(only)]);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
