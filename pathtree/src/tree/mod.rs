//! Generic addressable tree.
//!
//! A [`Tree`] owns a flat dictionary from [`NodeId`] to [`NodeRecord`]. The dictionary is
//! intentionally flat: parent/child relationships are derived from identifier prefixes, so
//! relocating a branch rewrites a set of keys instead of relinking pointers.
//!
//! The concrete tree type (plain [`GenericTree`], [`crate::ExpressionTree`], ...) is
//! abstracted by [`TreeKind`], which fixes the payload type and lets the generic algorithms
//! wrap freshly built trees into the same concrete type when they create embedded
//! subtrees, clone or import documents.
//!
//! The implementation is split across:
//!  - `path`: read-only path algebra (`children`, `descendants`, predicates).
//!  - `mutate`: append, replace, move, remove and graft.
//!  - `walker`: pre-order traversals, optionally crossing into embedded subtrees.
//!  - [`pojo`]: the flat document format used for interchange.
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    ops::{Deref, DerefMut},
};

use indexmap::IndexMap;

use crate::{
    id::{DEFAULT_ROOT_ID, IdGenerator, NodeId},
    utils::{
        conf::TreeConfig,
        error::{TreeError, TreeResult},
    },
};

pub mod handle;
mod mutate;
mod path;
pub mod pojo;
mod walker;

pub use handle::TreeHandle;

/// Old identifier to new identifier, in pre-order of the relocated nodes.
pub type IdMap = IndexMap<NodeId, NodeId>;

/// Capability implemented by every concrete tree type.
///
/// This is the factory the generic algorithms use to build same-kind trees (embedded
/// subtrees, clones, imported documents) without knowing the concrete type.
pub trait TreeKind: Sized {
    /// User payload stored in [`NodeContent::Value`].
    type Payload: Clone + PartialEq + Debug;

    /// Wrap a bare tree into the concrete type.
    fn from_tree(tree: Tree<Self>) -> Self;

    fn tree(&self) -> &Tree<Self>;

    fn tree_mut(&mut self) -> &mut Tree<Self>;
}

/// Content of a node.
pub enum NodeContent<K: TreeKind> {
    /// Placeholder. A node with empty content exists, unlike an absent node.
    Empty,
    /// User payload.
    Value(K::Payload),
    /// Embedded tree whose root identifier equals the identifier of the embedding node.
    Subtree(TreeHandle<K>),
}

impl<K: TreeKind> NodeContent<K> {
    pub fn from_option(payload: Option<K::Payload>) -> Self {
        payload.map_or(NodeContent::Empty, NodeContent::Value)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, NodeContent::Empty)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, NodeContent::Value(_))
    }

    pub fn is_subtree(&self) -> bool {
        matches!(self, NodeContent::Subtree(_))
    }

    pub fn as_value(&self) -> Option<&K::Payload> {
        match self {
            NodeContent::Value(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_subtree(&self) -> Option<&TreeHandle<K>> {
        match self {
            NodeContent::Subtree(handle) => Some(handle),
            _ => None,
        }
    }
}

impl<K: TreeKind> Clone for NodeContent<K> {
    fn clone(&self) -> Self {
        match self {
            NodeContent::Empty => NodeContent::Empty,
            NodeContent::Value(payload) => NodeContent::Value(payload.clone()),
            NodeContent::Subtree(handle) => NodeContent::Subtree(handle.clone()),
        }
    }
}

impl<K: TreeKind> PartialEq for NodeContent<K> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeContent::Empty, NodeContent::Empty) => true,
            (NodeContent::Value(a), NodeContent::Value(b)) => a == b,
            (NodeContent::Subtree(a), NodeContent::Subtree(b)) => a == b,
            _ => false,
        }
    }
}

impl<K: TreeKind> Debug for NodeContent<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeContent::Empty => f.write_str("Empty"),
            NodeContent::Value(payload) => f.debug_tuple("Value").field(payload).finish(),
            NodeContent::Subtree(handle) => f.debug_tuple("Subtree").field(handle).finish(),
        }
    }
}

/// Entry of the node dictionary.
pub struct NodeRecord<K: TreeKind> {
    pub content: NodeContent<K>,
}

impl<K: TreeKind> NodeRecord<K> {
    pub fn new(content: NodeContent<K>) -> Self {
        Self { content }
    }
}

/// Addressable tree over a flat, path-keyed node dictionary.
pub struct Tree<K: TreeKind> {
    dictionary: HashMap<NodeId, NodeRecord<K>>,
    root_id: NodeId,
    ids: IdGenerator,
}

impl<K: TreeKind> Tree<K> {
    /// Create a tree rooted at [`DEFAULT_ROOT_ID`] with its own identifier counter.
    pub fn new(root_content: Option<K::Payload>) -> Self {
        Self::with_root(NodeId::from(DEFAULT_ROOT_ID), root_content, IdGenerator::new())
    }

    /// Create a tree rooted at `root_id`, minting identifiers from `ids`.
    pub fn with_root(root_id: NodeId, root_content: Option<K::Payload>, ids: IdGenerator) -> Self {
        let mut dictionary = HashMap::new();
        dictionary.insert(
            root_id.clone(),
            NodeRecord::new(NodeContent::from_option(root_content)),
        );
        Self {
            dictionary,
            root_id,
            ids,
        }
    }

    pub fn with_config(config: &TreeConfig, root_content: Option<K::Payload>) -> Self {
        Self::with_root(
            NodeId::new(config.root_node_id.clone()),
            root_content,
            IdGenerator::new(),
        )
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    pub(crate) fn require(&self, id: &NodeId) -> TreeResult<&NodeRecord<K>> {
        self.dictionary
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound { id: id.clone() })
    }

    /// Reject identifiers of subtree boundaries for operations that edit structure.
    pub(crate) fn require_not_boundary(&self, id: &NodeId) -> TreeResult<()> {
        match self.require(id)?.content {
            NodeContent::Subtree(_) => Err(TreeError::SubtreeBoundary { id: id.clone() }),
            _ => Ok(()),
        }
    }

    /// Sorted children of every node, computed in one pass over the dictionary.
    pub(crate) fn child_index(&self) -> HashMap<&NodeId, Vec<&NodeId>> {
        let mut index: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for id in self.dictionary.keys() {
            if id == &self.root_id {
                continue;
            }
            let Some(parent) = id.parent() else {
                continue;
            };
            if let Some((parent, _)) = self.dictionary.get_key_value(&parent) {
                index.entry(parent).or_default().push(id);
            }
        }
        for children in index.values_mut() {
            children.sort();
        }
        index
    }

    /// Move the whole tree under a new root identifier.
    ///
    /// Every key is rewritten by substituting the old root prefix, and embedded subtrees
    /// are re-rooted recursively so their root keeps matching the embedding identifier.
    pub(crate) fn rebase_root(&mut self, new_root: &NodeId) {
        if &self.root_id == new_root {
            return;
        }
        let old_root = std::mem::replace(&mut self.root_id, new_root.clone());
        let dictionary = std::mem::take(&mut self.dictionary);
        self.dictionary = dictionary
            .into_iter()
            .map(|(id, record)| {
                let id = id.rebase(&old_root, new_root).unwrap_or(id);
                if let NodeContent::Subtree(handle) = &record.content {
                    handle.write().tree_mut().rebase_root(&id);
                }
                (id, record)
            })
            .collect();
    }

    /// Switch this tree and its embedded subtrees to the shared counter `ids`.
    ///
    /// The counter is first advanced past every numeric segment already in use below the
    /// root, so identifiers minted afterwards cannot collide with existing ones.
    pub(crate) fn adopt_generator(&mut self, ids: &IdGenerator) {
        if let Some(highest) = self
            .dictionary
            .keys()
            .filter_map(|id| id.highest_segment_below(&self.root_id))
            .max()
        {
            ids.ensure_above(highest);
        }
        self.ids = ids.clone();
        for record in self.dictionary.values() {
            if let NodeContent::Subtree(handle) = &record.content {
                handle.write().tree_mut().adopt_generator(ids);
            }
        }
    }

    /// Boundary holding `handle`, in this tree or in any tree embedded below it.
    pub(crate) fn boundary_of(&self, handle: &TreeHandle<K>) -> Option<NodeId> {
        self.dictionary.iter().find_map(|(id, record)| match &record.content {
            NodeContent::Subtree(embedded) if embedded == handle => Some(id.clone()),
            NodeContent::Subtree(embedded) => embedded.read().tree().boundary_of(handle),
            _ => None,
        })
    }

    /// Prepare content that is about to be stored at `at`.
    pub(crate) fn attach(&self, content: NodeContent<K>, at: &NodeId) -> NodeContent<K> {
        if let NodeContent::Subtree(handle) = &content {
            let mut guard = handle.write();
            let tree = guard.tree_mut();
            tree.rebase_root(at);
            tree.adopt_generator(&self.ids);
        }
        content
    }

    /// Fully independent copy: embedded subtrees are copied into fresh handles and the copy
    /// gets its own counter, continuing from the current value.
    pub fn deep_clone(&self) -> Self {
        self.deep_clone_sharing(&self.ids.detached())
    }

    pub(crate) fn deep_clone_sharing(&self, ids: &IdGenerator) -> Self {
        let dictionary = self
            .dictionary
            .iter()
            .map(|(id, record)| {
                let content = match &record.content {
                    NodeContent::Subtree(handle) => {
                        let copy = handle.read().tree().deep_clone_sharing(ids);
                        NodeContent::Subtree(TreeHandle::new(K::from_tree(copy)))
                    }
                    other => other.clone(),
                };
                (id.clone(), NodeRecord::new(content))
            })
            .collect();
        Self {
            dictionary,
            root_id: self.root_id.clone(),
            ids: ids.clone(),
        }
    }

    pub(crate) fn insert_record(&mut self, id: NodeId, content: NodeContent<K>) {
        self.dictionary.insert(id, NodeRecord::new(content));
    }

    /// Remove a single entry, leaving its descendants in place.
    ///
    /// Only for higher-level operations that restore the invariants themselves.
    pub(crate) fn remove_single_node(&mut self, id: &NodeId) -> Option<NodeRecord<K>> {
        self.dictionary.remove(id)
    }
}

impl<K: TreeKind> Debug for Tree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&NodeId> = self.dictionary.keys().collect();
        ids.sort();
        f.debug_struct("Tree")
            .field("root_id", &self.root_id)
            .field(
                "nodes",
                &ids.into_iter()
                    .map(|id| (id, &self.dictionary[id].content))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Plain tree over an arbitrary payload.
///
/// ```rust
/// # use pathtree::{GenericTree, NodeContent};
/// let mut tree = GenericTree::new(Some("root"));
/// let root = tree.root_id().clone();
/// let child = tree.append_child(&root, NodeContent::Value("child")).unwrap();
/// assert!(tree.is_branch(&root).unwrap());
/// assert_eq!(tree.get_content_at(&child).unwrap().as_value(), Some(&"child"));
/// ```
#[derive(Debug)]
pub struct GenericTree<T: Clone + PartialEq + Debug> {
    tree: Tree<GenericTree<T>>,
}

impl<T: Clone + PartialEq + Debug> GenericTree<T> {
    pub fn new(root_content: Option<T>) -> Self {
        Self {
            tree: Tree::new(root_content),
        }
    }

    pub fn with_config(config: &TreeConfig, root_content: Option<T>) -> Self {
        Self {
            tree: Tree::with_config(config, root_content),
        }
    }

    pub fn into_tree(self) -> Tree<GenericTree<T>> {
        self.tree
    }
}

impl<T: Clone + PartialEq + Debug> TreeKind for GenericTree<T> {
    type Payload = T;

    fn from_tree(tree: Tree<Self>) -> Self {
        Self { tree }
    }

    fn tree(&self) -> &Tree<Self> {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut Tree<Self> {
        &mut self.tree
    }
}

impl<T: Clone + PartialEq + Debug> Deref for GenericTree<T> {
    type Target = Tree<GenericTree<T>>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl<T: Clone + PartialEq + Debug> DerefMut for GenericTree<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}
