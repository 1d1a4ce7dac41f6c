//! Path identifiers and the identifier counter.
//!
//! A [`NodeId`] is a sequence of segments joined by [`DELIMITER`], e.g. `_root_:0:3`. The
//! parent of a node is derived by dropping its last segment; there are no stored
//! back-references. New segments are minted from an [`IdGenerator`], a counter that is
//! shared by reference between a tree, the subtrees embedded in it and every tree grafted
//! into it, so that no two children of any parent ever receive the same identifier.
use std::{
    cmp::Ordering,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Separator between the segments of a [`NodeId`].
pub const DELIMITER: char = ':';

/// Identifier given to the root of a tree when none is specified.
pub const DEFAULT_ROOT_ID: &str = "_root_";

/// Hierarchical, path-encoded node identifier.
///
/// Ordering is segment-wise and numeric where both segments are numbers, so sorting a set
/// of identifiers yields a pre-order listing with children in minting order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Identifier of the child of `self` with the given numeric segment.
    pub fn child(&self, segment: u64) -> NodeId {
        NodeId(format!("{}{}{}", self.0, DELIMITER, segment))
    }

    /// Identifier obtained by removing the last segment, `None` for single-segment ids.
    pub fn parent(&self) -> Option<NodeId> {
        self.0
            .rsplit_once(DELIMITER)
            .map(|(parent, _)| NodeId(parent.to_string()))
    }

    pub fn last_segment(&self) -> &str {
        self.0
            .rsplit_once(DELIMITER)
            .map_or(self.0.as_str(), |(_, last)| last)
    }

    pub fn segments(&self) -> SmallVec<[&str; 8]> {
        self.0.split(DELIMITER).collect()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.matches(DELIMITER).count() + 1
    }

    /// Whether `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &NodeId) -> bool {
        self.relative_to(ancestor).is_some()
    }

    /// Whether `self` lies exactly one level below `parent`.
    pub fn is_child_of(&self, parent: &NodeId) -> bool {
        self.relative_to(parent)
            .is_some_and(|rest| !rest.contains(DELIMITER))
    }

    /// Suffix of `self` below `ancestor`, without the leading delimiter.
    pub fn relative_to(&self, ancestor: &NodeId) -> Option<&str> {
        self.0
            .strip_prefix(ancestor.as_str())
            .and_then(|rest| rest.strip_prefix(DELIMITER))
            .filter(|rest| !rest.is_empty())
    }

    /// Substitute the `from` prefix of `self` with `to`.
    ///
    /// Returns `None` when `self` is neither `from` nor one of its descendants.
    pub fn rebase(&self, from: &NodeId, to: &NodeId) -> Option<NodeId> {
        if self == from {
            return Some(to.clone());
        }
        self.relative_to(from)
            .map(|rest| NodeId(format!("{}{}{}", to.0, DELIMITER, rest)))
    }

    /// Largest numeric segment of the suffix below `ancestor`.
    pub(crate) fn highest_segment_below(&self, ancestor: &NodeId) -> Option<u64> {
        self.relative_to(ancestor)?
            .split(DELIMITER)
            .filter_map(|segment| segment.parse::<u64>().ok())
            .max()
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut lhs = self.0.split(DELIMITER);
        let mut rhs = other.0.split(DELIMITER);
        loop {
            match (lhs.next(), rhs.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                        _ => a.cmp(b),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonic counter minting the numeric suffix of new node identifiers.
///
/// Cloning an [`IdGenerator`] shares the underlying counter, use [`IdGenerator::detached`]
/// to obtain an independent one.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator(Arc<AtomicU64>);

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self(Arc::new(AtomicU64::new(value)))
    }

    /// Mint the next value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// Value that the next call to [`IdGenerator::next`] returns.
    pub fn peek(&self) -> u64 {
        self.0.load(AtomicOrdering::Relaxed)
    }

    /// Guarantee that every value minted from now on is strictly greater than `value`.
    pub fn ensure_above(&self, value: u64) {
        self.0
            .fetch_max(value.saturating_add(1), AtomicOrdering::Relaxed);
    }

    /// An independent counter continuing from the current value.
    pub fn detached(&self) -> Self {
        Self::starting_at(self.peek())
    }

    /// Whether both generators share the same counter.
    pub fn shares_counter_with(&self, other: &IdGenerator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
