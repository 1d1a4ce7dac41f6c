//! Expression trees: junction/operand algebra over [`Predicate`] payloads.
//!
//! An expression tree is a [`Tree`] whose branches are `$and` / `$or` junctions and whose
//! leaves are operands. On top of the generic operations it keeps one structural invariant
//! visible to callers: a branch never has a single child. Promotion of a leaf into a
//! junction ([`ExpressionTree::append_with_junction`]) and the collapsing removal
//! ([`ExpressionTree::remove_at`]) maintain it, and [`ExpressionTree::validate_tree`]
//! checks it on untrusted input.
use std::ops::{Deref, DerefMut};

use log::debug;

use crate::{
    id::NodeId,
    tree::{IdMap, NodeContent, Tree, TreeHandle, TreeKind, pojo::PojoDocument},
    utils::{
        conf::TreeConfig,
        error::{TreeError, TreeResult},
    },
};

pub mod predicate;

pub use predicate::{JunctionOperator, Predicate};

/// Outcome of [`ExpressionTree::append_with_junction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionAppend {
    /// Whether the parent was a leaf and has been promoted into a junction.
    pub is_new_branch: bool,
    /// Identifier of the node now holding the junction (the parent itself).
    pub junction_id: NodeId,
    /// Where the parent's previous content was re-appended, when it was a leaf.
    pub original_content_id: Option<NodeId>,
    pub new_node_id: NodeId,
}

/// Outcome of [`ExpressionTree::append_tree_at`].
///
/// Source and target identifiers live in different namespaces that commonly overlap (both
/// trees rooted at `_root_`), so the promotion of the target is reported on its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Graft {
    /// Source identifier to identifier in the target tree.
    pub grafted: IdMap,
    /// New identifier of the target's previous content, when the target was a leaf and has
    /// been promoted into a junction.
    pub promoted: Option<NodeId>,
}

/// Outcome of [`ExpressionTree::remove_at`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Removal {
    /// Identifiers deleted together with their content, in pre-order.
    pub removed: Vec<NodeId>,
    /// Nodes whose content survived under a new identifier. When the last sibling is
    /// collapsed into its parent the first entry maps the sibling onto the parent.
    pub relocated: IdMap,
}

#[derive(Debug)]
pub struct ExpressionTree {
    tree: Tree<ExpressionTree>,
    default_junction: JunctionOperator,
}

impl ExpressionTree {
    /// Create a tree with an empty root at the default root identifier.
    pub fn new() -> Self {
        Self::from_tree(Tree::new(None))
    }

    pub fn with_root(content: Predicate) -> Self {
        Self::from_tree(Tree::new(Some(content)))
    }

    pub fn with_config(config: &TreeConfig) -> Self {
        Self {
            tree: Tree::with_config(config, None),
            default_junction: config.default_junction,
        }
    }

    pub fn into_tree(self) -> Tree<ExpressionTree> {
        self.tree
    }

    /// Junction used when grafting onto a leaf.
    pub fn default_junction(&self) -> JunctionOperator {
        self.default_junction
    }

    /// Change the default junction of this tree and of every embedded subtree.
    pub fn set_default_junction(&mut self, junction: JunctionOperator) {
        self.default_junction = junction;
        for id in self.tree.subtree_ids() {
            if let Ok(Some(handle)) = self.tree.get_subtree_at(&id) {
                handle.write().set_default_junction(junction);
            }
        }
    }

    /// Combine `content` with the existing content of `parent` through `junction`.
    ///
    /// - `parent` is a branch: its content becomes `junction`, and `content` fills the first
    ///   empty child if there is one, otherwise it is appended as a new child.
    /// - `parent` is a leaf: its current content is re-appended as a first child, its own
    ///   content becomes `junction` and `content` is appended as the second child.
    ///
    /// Subtree boundaries are rejected, their interior belongs to the embedded tree.
    pub fn append_with_junction(
        &mut self,
        parent: &NodeId,
        junction: Predicate,
        content: Predicate,
    ) -> TreeResult<JunctionAppend> {
        self.tree.require_not_boundary(parent)?;

        if self.tree.is_branch(parent)? {
            let placeholder = self
                .tree
                .get_children_ids_of(parent, false)?
                .into_iter()
                .find(|child| self.tree.get_content_at(child).is_ok_and(NodeContent::is_empty));
            self.tree.replace_content_at(parent, NodeContent::Value(junction))?;
            let new_node_id = match placeholder {
                Some(slot) => {
                    self.tree.replace_content_at(&slot, NodeContent::Value(content))?;
                    slot
                }
                None => self.tree.append_child(parent, NodeContent::Value(content))?,
            };
            return Ok(JunctionAppend {
                is_new_branch: false,
                junction_id: parent.clone(),
                original_content_id: None,
                new_node_id,
            });
        }

        let original_content_id = self.promote_leaf(parent, junction)?;
        let new_node_id = self.tree.append_child(parent, NodeContent::Value(content))?;
        Ok(JunctionAppend {
            is_new_branch: true,
            junction_id: parent.clone(),
            original_content_id: Some(original_content_id),
            new_node_id,
        })
    }

    /// Push the content of leaf `id` down into a new first child and put `junction` in its
    /// place. Returns the identifier of the new child.
    fn promote_leaf(&mut self, id: &NodeId, junction: Predicate) -> TreeResult<NodeId> {
        let original = self.tree.get_content_at(id)?.clone();
        let original_id = self.tree.append_child(id, original)?;
        self.tree.replace_content_at(id, NodeContent::Value(junction))?;
        debug!("Promoted leaf `{}` into a junction, content kept at `{}`", id, original_id);
        Ok(original_id)
    }

    /// Graft `source` (or its branch at `source_root`) under `target`.
    ///
    /// A leaf `target` is first promoted with the default junction, like
    /// [`ExpressionTree::append_with_junction`] does, so the grafted branch lands next to
    /// the target's previous content.
    pub fn append_tree_at(
        &mut self,
        target: &NodeId,
        source: &ExpressionTree,
        source_root: Option<&NodeId>,
    ) -> TreeResult<Graft> {
        self.tree.require_not_boundary(target)?;
        source.require(source_root.unwrap_or(source.root_id()))?;

        let promoted = match self.tree.is_leaf(target)? {
            true => Some(self.promote_leaf(target, Predicate::junction(self.default_junction))?),
            false => None,
        };
        let grafted = self.tree.append_tree_at(target, &source.tree, source_root)?;
        Ok(Graft { grafted, promoted })
    }

    /// Remove `id` and its descendants without leaving a single-child branch behind.
    ///
    /// If `id` has exactly one sibling, that sibling collapses into the parent: the parent
    /// keeps its identifier, takes the sibling's content, and the sibling's descendants are
    /// re-keyed under the parent. Otherwise this is the plain cascading removal.
    ///
    /// Collapsing an embedded subtree into the root is rejected, the root never holds one.
    pub fn remove_at(&mut self, id: &NodeId) -> TreeResult<Removal> {
        let siblings = self.tree.get_sibling_ids_of(id)?;
        let [sibling] = siblings.as_slice() else {
            let removed = self.tree.remove_at(id)?;
            return Ok(Removal {
                removed,
                relocated: IdMap::new(),
            });
        };
        let Some(parent) = self.tree.get_parent_id_of(id)? else {
            return Err(TreeError::RootRemoval { id: id.clone() });
        };

        let content = self.tree.get_content_at(sibling)?.clone();
        if content.is_subtree() && self.tree.is_root(&parent) {
            return Err(TreeError::RootSubtree { id: parent });
        }
        let descendants = self.tree.get_descendant_ids_of(sibling, true)?;
        for descendant in &descendants {
            let Some(new_id) = descendant.rebase(sibling, &parent) else {
                continue;
            };
            let vacated = new_id == *id
                || new_id.is_descendant_of(id)
                || new_id == *sibling
                || new_id.is_descendant_of(sibling);
            if self.tree.contains(&new_id) && !vacated {
                return Err(TreeError::IdCollision { id: new_id });
            }
        }

        let removed = self.tree.remove_at(id)?;
        self.tree.remove_single_node(sibling);
        let mut relocated = IdMap::with_capacity(descendants.len() + 1);
        relocated.insert(sibling.clone(), parent.clone());
        relocated.extend(self.tree.relocate(&descendants, sibling, &parent));
        self.tree.replace_content_at(&parent, content)?;
        debug!("Removed `{}` and collapsed `{}` into `{}`", id, sibling, parent);

        Ok(Removal { removed, relocated })
    }

    /// Independent copy of the branch at `id`, rooted at `id`.
    pub fn clone_at(&self, id: &NodeId) -> TreeResult<Self> {
        let document = self.tree.to_pojo_at(id)?;
        let mut copy = Self::from_tree(Tree::from_pojo(&document)?);
        copy.set_default_junction(self.default_junction);
        Ok(copy)
    }

    /// Embed a new, empty expression tree as a fresh child of `parent`. The subtree
    /// inherits this tree's default junction.
    pub fn create_subtree_at(&mut self, parent: &NodeId) -> TreeResult<TreeHandle<ExpressionTree>> {
        let handle = self.tree.create_subtree_at(parent)?;
        handle.write().default_junction = self.default_junction;
        Ok(handle)
    }

    /// Check that no branch, embedded subtrees included, has exactly one child.
    pub fn validate_tree(&self) -> TreeResult<()> {
        let index = self.tree.child_index();
        for id in self.tree.node_ids() {
            if let Some(children) = index.get(&id).filter(|children| children.len() == 1) {
                return Err(TreeError::SingleChildBranch {
                    children: children.iter().map(|child| (*child).clone()).collect(),
                    id,
                });
            }
        }
        for id in self.tree.subtree_ids() {
            if let Some(handle) = self.tree.get_subtree_at(&id)? {
                handle.read().validate_tree()?;
            }
        }
        Ok(())
    }

    /// Import a document with the default configuration.
    pub fn from_pojo(document: &PojoDocument<Option<Predicate>>) -> TreeResult<Self> {
        Self::from_pojo_with_config(document, &TreeConfig::default())
    }

    pub fn from_pojo_with_config(
        document: &PojoDocument<Option<Predicate>>,
        config: &TreeConfig,
    ) -> TreeResult<Self> {
        Self::finish_import(Tree::from_pojo(document)?, config)
    }

    /// Import a document whose contents are converted with `transform`.
    pub fn from_pojo_with<P, F>(document: &PojoDocument<P>, transform: F, config: &TreeConfig) -> TreeResult<Self>
    where
        F: Fn(&P) -> Option<Predicate>,
    {
        Self::finish_import(Tree::from_pojo_with(document, transform)?, config)
    }

    pub fn from_json_str(source: &str) -> TreeResult<Self> {
        Self::finish_import(Tree::from_json_str(source)?, &TreeConfig::default())
    }

    fn finish_import(tree: Tree<ExpressionTree>, config: &TreeConfig) -> TreeResult<Self> {
        let mut tree = Self::from_tree(tree);
        tree.set_default_junction(config.default_junction);
        if config.validate_on_import {
            tree.validate_tree()?;
        }
        Ok(tree)
    }
}

impl Default for ExpressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeKind for ExpressionTree {
    type Payload = Predicate;

    fn from_tree(tree: Tree<Self>) -> Self {
        Self {
            tree,
            default_junction: JunctionOperator::default(),
        }
    }

    fn tree(&self) -> &Tree<Self> {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut Tree<Self> {
        &mut self.tree
    }
}

impl Deref for ExpressionTree {
    type Target = Tree<ExpressionTree>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl DerefMut for ExpressionTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}
