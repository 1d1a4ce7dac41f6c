use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{id::NodeId, tree::TreeKind};

/// Shared reference to an embedded tree.
///
/// Equality, hashing and [`crate::KeyStore`] reverse lookups all use the
/// address of the shared allocation: two handles are equal only if they designate the very
/// same tree instance, regardless of content.
pub struct TreeHandle<K>(Arc<RwLock<K>>);

impl<K> TreeHandle<K> {
    pub fn new(tree: K) -> Self {
        Self(Arc::new(RwLock::new(tree)))
    }

    /// Shared access to the embedded tree.
    ///
    /// Uses a recursive read lock so nested traversals holding another read guard on the
    /// same handle do not stall behind a queued writer.
    pub fn read(&self) -> RwLockReadGuard<'_, K> {
        self.0.read_recursive()
    }

    /// Exclusive access to the embedded tree.
    ///
    /// Blocks while any read guard on this handle is alive, including guards held further
    /// up the current call stack.
    pub fn write(&self) -> RwLockWriteGuard<'_, K> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of handles sharing the tree.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<K: TreeKind> TreeHandle<K> {
    /// Root identifier of the embedded tree, equal to the embedding node's identifier.
    pub fn root_id(&self) -> NodeId {
        self.read().tree().root_id().clone()
    }
}

impl<K> Clone for TreeHandle<K> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K> PartialEq for TreeHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<K> Eq for TreeHandle<K> {}

impl<K> Hash for TreeHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl<K> fmt::Debug for TreeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeHandle({:p})", Arc::as_ptr(&self.0))
    }
}
