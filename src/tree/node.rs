//! Placed tree elements
//!
//! Closed sum type: Leaf | Branch | GhostBranch | LocalPoint
//! Children always sit at 2a (left) and 2a + 1 (right).

use std::fmt;

use super::Address;
use crate::segment::Point;

/// Connectivity of one node: own key, parent key, child keys.
///
/// `parent == None` marks the outlet sentinel above the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Connections {
    /// Own address
    pub id: Address,
    /// Downstream neighbour
    pub parent: Option<Address>,
    /// Upstream child at `2·id`
    pub left_child: Option<Address>,
    /// Upstream child at `2·id + 1`
    pub right_child: Option<Address>,
}

impl Connections {
    /// Connections of a node without children.
    pub fn childless(id: Address) -> Self {
        let parent = id.parent();
        Self {
            id,
            parent,
            left_child: None,
            right_child: None,
        }
    }

    /// Connections with children at the canonical positions.
    pub fn with_children(id: Address, has_left: bool, has_right: bool) -> Self {
        let left_child = has_left.then(|| id.left_child());
        let right_child = has_right.then(|| id.right_child());
        Self {
            parent: id.parent(),
            id,
            left_child,
            right_child,
        }
    }

    /// Present children, left first.
    pub fn children(&self) -> impl Iterator<Item = &Address> {
        self.left_child.iter().chain(self.right_child.iter())
    }

    /// Check `parent(id) == parent` and the 2a / 2a + 1 child positions.
    pub fn is_consistent(&self) -> bool {
        self.parent == self.id.parent()
            && self
                .left_child
                .as_ref()
                .map_or(true, |left| *left == self.id.left_child())
            && self
                .right_child
                .as_ref()
                .map_or(true, |right| *right == self.id.right_child())
    }
}

/// A river reach: a real segment or a zero-length merge.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Reach {
    /// Position and neighbours
    pub connections: Connections,
    /// Depth below the outlet
    pub depth: u32,
    /// Upstream end
    pub start: Point,
    /// Downstream end
    pub end: Point,
}

/// Point-like node spliced in after construction (e.g. a gauge).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Station {
    /// Position and neighbours (single left child)
    pub connections: Connections,
    /// Depth below the outlet
    pub depth: u32,
    /// Location
    pub point: Point,
    /// Caller-supplied name
    pub label: String,
}

/// Variant tag, for reporting and matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum NodeKind {
    /// No children
    Leaf,
    /// One or two real tributaries
    Branch,
    /// Synthetic merge of an n-ary confluence
    GhostBranch,
    /// Decorator-inserted point
    LocalPoint,
}

/// One placed element of the drainage tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum TreeNode {
    /// Headwater segment
    Leaf(Reach),
    /// Segment with upstream tributaries
    Branch(Reach),
    /// Zero-length merge node (`start == end`)
    GhostBranch(Reach),
    /// Point inserted by the decorator
    LocalPoint(Station),
}

impl TreeNode {
    /// Variant tag.
    pub fn kind(&self) -> NodeKind {
        match self {
            TreeNode::Leaf(_) => NodeKind::Leaf,
            TreeNode::Branch(_) => NodeKind::Branch,
            TreeNode::GhostBranch(_) => NodeKind::GhostBranch,
            TreeNode::LocalPoint(_) => NodeKind::LocalPoint,
        }
    }

    /// Connectivity record.
    pub fn connections(&self) -> &Connections {
        match self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                &reach.connections
            }
            TreeNode::LocalPoint(station) => &station.connections,
        }
    }

    fn connections_mut(&mut self) -> &mut Connections {
        match self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                &mut reach.connections
            }
            TreeNode::LocalPoint(station) => &mut station.connections,
        }
    }

    /// Own address.
    pub fn address(&self) -> &Address {
        &self.connections().id
    }

    /// Parent address (`None` for the origin).
    pub fn parent_address(&self) -> Option<&Address> {
        self.connections().parent.as_ref()
    }

    /// Left child address.
    pub fn left_child(&self) -> Option<&Address> {
        self.connections().left_child.as_ref()
    }

    /// Right child address.
    pub fn right_child(&self) -> Option<&Address> {
        self.connections().right_child.as_ref()
    }

    /// Children whose completion this node waits for.
    pub fn children(&self) -> impl Iterator<Item = &Address> {
        self.connections().children()
    }

    /// Depth below the outlet.
    pub fn depth(&self) -> u32 {
        match self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                reach.depth
            }
            TreeNode::LocalPoint(station) => station.depth,
        }
    }

    /// Upstream end (a LocalPoint starts and ends at its point).
    pub fn start(&self) -> Point {
        match self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                reach.start
            }
            TreeNode::LocalPoint(station) => station.point,
        }
    }

    /// Downstream end.
    pub fn end(&self) -> Point {
        match self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                reach.end
            }
            TreeNode::LocalPoint(station) => station.point,
        }
    }

    /// Physical length (zero for ghosts and points).
    pub fn length(&self) -> f64 {
        self.start().distance(&self.end())
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf(_))
    }

    /// Same node moved to new connections, with its depth shifted.
    pub fn rekeyed(mut self, connections: Connections, depth_shift: u32) -> Self {
        *self.connections_mut() = connections;
        match &mut self {
            TreeNode::Leaf(reach) | TreeNode::Branch(reach) | TreeNode::GhostBranch(reach) => {
                reach.depth += depth_shift;
            }
            TreeNode::LocalPoint(station) => station.depth += depth_shift,
        }
        self
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} depth={}", self.kind(), self.address(), self.depth())?;
        if let Some(parent) = self.parent_address() {
            write!(f, " parent={}", parent)?;
        }
        for child in self.children() {
            write!(f, " child={}", child)?;
        }
        match self {
            TreeNode::LocalPoint(station) => write!(f, " at {} '{}'", station.point, station.label),
            _ => write!(f, " {} -> {}", self.start(), self.end()),
        }
    }
}
