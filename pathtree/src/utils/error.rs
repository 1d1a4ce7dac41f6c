use strum::EnumIs;
use thiserror::Error;

use crate::id::NodeId;

/// Coarse classification of a [`TreeError`].
///
/// Callers that only care about the family of a failure (for instance to map it onto an
/// HTTP status) should match on [`TreeError::kind`] rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum ErrorKind {
    /// A referenced node identifier or value is absent.
    NotFound,
    /// The operation would break a structural invariant of the tree.
    InvariantViolation,
    /// A POJO document does not describe a single connected tree.
    MalformedDocument,
    /// A graft computed an identifier that already exists.
    IdCollision,
    /// An external key is not registered in the key store.
    UnknownKey,
    /// Configuration could not be parsed.
    Configuration,
    /// JSON encoding or decoding failed.
    Serialization,
}

#[derive(Debug, Error, EnumIs)]
pub enum TreeError {
    /// The node is not present in the tree dictionary.
    #[error("Node `{id}` does not exist in the tree dictionary.")]
    NodeNotFound { id: NodeId },

    /// No key of a key store resolves to the requested value.
    #[error("No key of the store resolves to the value `{value}`.")]
    ValueNotFound { value: String },

    /// The root is never removable.
    #[error("The root node `{id}` cannot be removed.")]
    RootRemoval { id: NodeId },

    /// The root is never relocated.
    #[error("The root node `{id}` cannot be moved.")]
    RootMove { id: NodeId },

    /// The root may never hold an embedded tree.
    #[error("The root node `{id}` cannot be replaced by an embedded subtree.")]
    RootSubtree { id: NodeId },

    /// A node cannot be moved below itself.
    #[error(
        "Node `{source_id}` cannot be moved under `{target}`, which is the node itself or one of its descendants."
    )]
    MoveIntoDescendant { source_id: NodeId, target: NodeId },

    /// Structural operations do not cross an embedding boundary.
    #[error(
        "Node `{id}` is an embedded subtree boundary. Its interior belongs to the embedded tree and must be edited there."
    )]
    SubtreeBoundary { id: NodeId },

    /// A handle is stored at a single boundary.
    #[error("The embedded tree is already stored at boundary `{id}` and cannot be embedded a second time.")]
    SubtreeAlreadyEmbedded { id: NodeId },

    /// Embedded trees only replace leaves.
    #[error("Node `{id}` has children and cannot become an embedded subtree boundary.")]
    SubtreeOverBranch { id: NodeId },

    /// A branch was left with a single child.
    #[error(
        "Branch `{id}` has a single child {children:?}. Every branch of an expression tree must have at least two children."
    )]
    SingleChildBranch { id: NodeId, children: Vec<NodeId> },

    /// Several keys resolve to a value that was expected to be unique.
    #[error("Keys {keys:?} all resolve to the value `{value}`, exactly one was expected.")]
    AmbiguousKey { value: String, keys: Vec<String> },

    /// No self-parented entry in a document.
    #[error("The document has no root entry. The root is the single entry whose key equals its `parentId`.")]
    MissingRoot,

    /// More than one self-parented entry in a document.
    #[error("The document has {} root entries ({candidates:?}), exactly one was expected.", .candidates.len())]
    MultipleRoots { candidates: Vec<String> },

    /// The document root carries an embedded-tree marker.
    #[error("The root entry `{key}` of the document cannot be an embedded subtree marker.")]
    SubtreeRoot { key: String },

    /// Entries that could not be reached from the document root.
    #[error(
        "The document contains {} entries unreachable from its root: {keys:?}. Their parents are missing or form a cycle.", .keys.len()
    )]
    OrphanNodes { keys: Vec<String> },

    /// A computed identifier already exists in the target dictionary.
    #[error("The computed identifier `{id}` already exists in the target tree.")]
    IdCollision { id: NodeId },

    /// An external key is not known to the key store.
    #[error("Key `{key}` is not known to this tree.")]
    UnknownKey { key: String },

    /// A node of an obfuscated tree has no key, which happens when the wrapped tree is
    /// edited behind its wrapper's back.
    #[error("A node of the tree has no registered key.")]
    UnregisteredNode,

    #[error("Failed to parse tree configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to render tree configuration: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreeError::NodeNotFound { .. } | TreeError::ValueNotFound { .. } => ErrorKind::NotFound,
            TreeError::RootRemoval { .. }
            | TreeError::RootMove { .. }
            | TreeError::RootSubtree { .. }
            | TreeError::MoveIntoDescendant { .. }
            | TreeError::SubtreeBoundary { .. }
            | TreeError::SubtreeOverBranch { .. }
            | TreeError::SubtreeAlreadyEmbedded { .. }
            | TreeError::SingleChildBranch { .. }
            | TreeError::AmbiguousKey { .. } => ErrorKind::InvariantViolation,
            TreeError::MissingRoot
            | TreeError::MultipleRoots { .. }
            | TreeError::SubtreeRoot { .. }
            | TreeError::OrphanNodes { .. } => ErrorKind::MalformedDocument,
            TreeError::IdCollision { .. } => ErrorKind::IdCollision,
            TreeError::UnknownKey { .. } | TreeError::UnregisteredNode => ErrorKind::UnknownKey,
            TreeError::Config(_) | TreeError::ConfigRender(_) => ErrorKind::Configuration,
            TreeError::Json(_) => ErrorKind::Serialization,
        }
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
