//! Pathtree: an addressable tree engine keyed by hierarchical path identifiers.
//!
//! Nodes live in a single flat dictionary keyed by [`NodeId`]s such as `_root_`, `_root_:0`
//! or `_root_:0:3`. The hierarchy is encoded entirely in those strings: the parent of a node
//! is obtained by dropping the last segment, and relocating a whole branch is a matter of
//! rewriting identifier prefixes.
//!
//! Layers, leaves first:
//!  - [`id`]: path identifiers and the shared, monotonic [`IdGenerator`].
//!  - [`keystore`]: a store of opaque external keys resolving to internal values.
//!  - [`tree`]: the generic [`Tree`] with path algebra, mutation, traversal and the POJO
//!    document format.
//!  - [`expression`]: [`ExpressionTree`], junction/operand algebra over predicates.
//!  - [`obfuscated`]: [`ObfuscatedExpressionTree`], an expression tree exposed only through
//!    random keys.
//!
//! Trees are single-writer structures. Embedded subtrees are shared through
//! [`TreeHandle`]s, so a host may move a tree between threads, but concurrent mutation
//! of one tree without outside serialisation is not supported.
//!
//! Example
//! ```
//! use pathtree::prelude::*;
//!
//! let mut tree = ExpressionTree::new();
//! let root = tree.root_id().clone();
//! tree.replace_content_at(&root, NodeContent::Value(Predicate::operand("age", "$gt", 10)))
//!     .unwrap();
//! let outcome = tree
//!     .append_with_junction(&root, Predicate::and(), Predicate::operand("age", "$lt", 20))
//!     .unwrap();
//! assert!(outcome.is_new_branch);
//! assert_eq!(tree.get_children_ids_of(&root, true).unwrap().len(), 2);
//!
//! let document = tree.to_pojo_at(&root).unwrap();
//! let copy = ExpressionTree::from_pojo(&document).unwrap();
//! assert_eq!(copy.count_total_nodes(true), 3);
//! ```

pub mod expression;
pub mod id;
pub mod keystore;
pub mod obfuscated;
pub mod tree;
pub mod utils;

pub use expression::{ExpressionTree, JunctionOperator, Predicate};
pub use id::{IdGenerator, NodeId};
pub use keystore::KeyStore;
pub use obfuscated::ObfuscatedExpressionTree;
pub use tree::{GenericTree, NodeContent, Tree, TreeHandle, TreeKind};
pub use utils::conf::TreeConfig;
pub use utils::error::{ErrorKind, TreeError, TreeResult};

pub mod prelude {
    //! Convenient re-exports for end users.
    pub use crate::expression::{ExpressionTree, Graft, JunctionAppend, JunctionOperator, Predicate, Removal};
    pub use crate::id::{IdGenerator, NodeId};
    pub use crate::keystore::{KeyStore, KeyStyle};
    pub use crate::obfuscated::{ExposedContent, KeyedGraft, KeyedJunctionAppend, ObfuscatedExpressionTree};
    pub use crate::tree::pojo::{PojoDocument, PojoEntry, PojoNodeType};
    pub use crate::tree::{GenericTree, IdMap, NodeContent, Tree, TreeHandle, TreeKind};
    pub use crate::utils::conf::TreeConfig;
    pub use crate::utils::error::{ErrorKind, TreeError, TreeResult};
}
