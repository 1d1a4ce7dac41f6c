//! Flat document format ("POJO") used to exchange trees.
//!
//! A document maps node keys to `{ parentId, nodeContent, nodeType? }` entries:
//!
//! ```json
//! {
//!   "_root_":   { "parentId": "_root_", "nodeContent": { "operator": "$or" } },
//!   "_root_:0": { "parentId": "_root_", "nodeContent": { "subject": "x", "operator": "$eq", "value": 1 } },
//!   "_root_:1": { "parentId": "_root_", "nodeContent": { "subject": "y", "operator": "$eq", "value": 2 } }
//! }
//! ```
//!
//! - Exactly one entry is its own parent; it is the root.
//! - `nodeType: "subtree"` marks the boundary of an embedded tree. Its `nodeContent` is the
//!   embedded root's payload, and the embedded tree's descendants are flattened into the
//!   same document, attached to the marker through their `parentId`.
//! - Keys carry no required structure. Import re-mints identifiers; only the root key is
//!   kept, as the identifier of the imported root.
//! - Entry order is preserved, and children are imported in document order.
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    id::{IdGenerator, NodeId},
    tree::{NodeContent, Tree, TreeHandle, TreeKind},
    utils::error::{TreeError, TreeResult},
};

/// Marker distinguishing embedded-tree boundaries in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PojoNodeType {
    #[serde(rename = "subtree")]
    Subtree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PojoEntry<P> {
    pub parent_id: String,
    pub node_content: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<PojoNodeType>,
}

impl<P> PojoEntry<P> {
    pub fn new(parent_id: impl Into<String>, node_content: P) -> Self {
        Self {
            parent_id: parent_id.into(),
            node_content,
            node_type: None,
        }
    }

    pub fn subtree(parent_id: impl Into<String>, node_content: P) -> Self {
        Self {
            parent_id: parent_id.into(),
            node_content,
            node_type: Some(PojoNodeType::Subtree),
        }
    }

    pub fn is_subtree(&self) -> bool {
        self.node_type == Some(PojoNodeType::Subtree)
    }
}

/// Insertion-ordered document, keyed by node key.
pub type PojoDocument<P> = IndexMap<String, PojoEntry<P>>;

impl<K: TreeKind> Tree<K> {
    /// Export the branch rooted at `start`, payloads copied as-is and `null` for empty nodes.
    pub fn to_pojo_at(&self, start: &NodeId) -> TreeResult<PojoDocument<Option<K::Payload>>> {
        self.to_pojo_at_with(start, |payload| payload.cloned())
    }

    /// Export the branch rooted at `start`, converting payloads with `transform`.
    ///
    /// `start` becomes the document root (its own parent). If `start` is a subtree boundary,
    /// the embedded tree is exported as a plain document.
    pub fn to_pojo_at_with<P, F>(&self, start: &NodeId, transform: F) -> TreeResult<PojoDocument<P>>
    where
        F: Fn(Option<&K::Payload>) -> P,
    {
        let record = self.require(start)?;
        if let NodeContent::Subtree(handle) = &record.content {
            let guard = handle.read();
            let subtree = guard.tree();
            return subtree.to_pojo_at_with(&subtree.root_id, transform);
        }
        let mut document = PojoDocument::new();
        self.export_branch(start, start.as_str(), false, &mut document, &transform);
        Ok(document)
    }

    fn export_branch<P>(
        &self,
        start: &NodeId,
        parent_key: &str,
        as_subtree: bool,
        document: &mut PojoDocument<P>,
        transform: &dyn Fn(Option<&K::Payload>) -> P,
    ) {
        let index = self.child_index();
        let mut stack: Vec<(&NodeId, String)> = vec![(start, parent_key.to_string())];
        while let Some((id, parent)) = stack.pop() {
            let content = &self.dictionary[id].content;
            if let NodeContent::Subtree(handle) = content {
                let guard = handle.read();
                let subtree = guard.tree();
                subtree.export_branch(&subtree.root_id, &parent, true, document, transform);
                continue;
            }

            let mut entry = PojoEntry::new(parent, transform(content.as_value()));
            if as_subtree && id == start {
                entry.node_type = Some(PojoNodeType::Subtree);
            }
            document.insert(id.to_string(), entry);
            if let Some(children) = index.get(id) {
                stack.extend(children.iter().rev().map(|child| (*child, id.to_string())));
            }
        }
    }

    /// Import a document whose contents are `null` (empty) or payloads.
    pub fn from_pojo(document: &PojoDocument<Option<K::Payload>>) -> TreeResult<Self> {
        Self::from_pojo_with(document, |content| content.clone())
    }

    /// Import a document, converting contents with `transform` (`None` means empty).
    ///
    /// Fails with a malformed-document error if the document has zero or several roots, a
    /// subtree marker on its root, or entries that cannot be reached from the root.
    pub fn from_pojo_with<P, F>(document: &PojoDocument<P>, transform: F) -> TreeResult<Self>
    where
        F: Fn(&P) -> Option<K::Payload>,
    {
        let mut roots = document.iter().filter(|(key, entry)| **key == entry.parent_id);
        let (root_key, root_entry) = match (roots.next(), roots.next()) {
            (None, _) => return Err(TreeError::MissingRoot),
            (Some(root), None) => root,
            (Some(first), Some(second)) => {
                let candidates = [first, second]
                    .into_iter()
                    .chain(roots)
                    .map(|(key, _)| key.clone())
                    .collect();
                return Err(TreeError::MultipleRoots { candidates });
            }
        };
        if root_entry.is_subtree() {
            return Err(TreeError::SubtreeRoot {
                key: root_key.clone(),
            });
        }

        // Working copy: pending entries grouped by parent key, in document order. Entries
        // are detached from it as they are attached to the tree.
        let mut pending: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (key, entry) in document {
            if key != root_key {
                pending
                    .entry(entry.parent_id.as_str())
                    .or_default()
                    .push(key.as_str());
            }
        }

        let mut tree = Tree::with_root(
            NodeId::new(root_key.clone()),
            transform(&root_entry.node_content),
            IdGenerator::new(),
        );
        let root_id = tree.root_id.clone();
        tree.import_children(root_key, &root_id, document, &mut pending, &transform);

        if !pending.is_empty() {
            let keys = pending.into_values().flatten().map(str::to_string).collect();
            return Err(TreeError::OrphanNodes { keys });
        }
        debug!("Imported a document of {} entries rooted at `{}`", document.len(), root_key);
        Ok(tree)
    }

    fn import_children<'d, P>(
        &mut self,
        parent_key: &str,
        parent_id: &NodeId,
        document: &'d PojoDocument<P>,
        pending: &mut IndexMap<&'d str, Vec<&'d str>>,
        transform: &dyn Fn(&P) -> Option<K::Payload>,
    ) {
        let Some(children) = pending.shift_remove(parent_key) else {
            return;
        };
        for key in children {
            let entry = &document[key];
            let content = transform(&entry.node_content);
            let id = parent_id.child(self.ids.next());
            if entry.is_subtree() {
                let mut subtree = Tree::with_root(id.clone(), content, self.ids.clone());
                subtree.import_children(key, &id, document, pending, transform);
                self.insert_record(id, NodeContent::Subtree(TreeHandle::new(K::from_tree(subtree))));
            } else {
                self.insert_record(id.clone(), NodeContent::from_option(content));
                self.import_children(key, &id, document, pending, transform);
            }
        }
    }

    /// Export the branch rooted at `start` as a JSON object.
    pub fn to_json_at(&self, start: &NodeId) -> TreeResult<serde_json::Value>
    where
        K::Payload: Serialize,
    {
        Ok(serde_json::to_value(self.to_pojo_at(start)?)?)
    }

    /// Import a tree from a JSON document.
    pub fn from_json_str(source: &str) -> TreeResult<Self>
    where
        K::Payload: DeserializeOwned,
    {
        let document: PojoDocument<Option<K::Payload>> = serde_json::from_str(source)?;
        Self::from_pojo(&document)
    }
}
