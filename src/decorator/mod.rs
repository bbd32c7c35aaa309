//! LocalPoint insertion
//!
//! Splices a point-like node (e.g. a gauge) in at the outlet of an existing
//! node. The point takes over the node's address `a`; the node and its
//! whole subtree move one level down, under `2a`:
//!
//!   before:  parent ── a ── (subtree of a)
//!   after:   parent ── a:LocalPoint ── 2a ── (subtree, re-keyed)
//!
//! Re-keying keeps each node's path relative to the moved subtree root.

use tracing::debug;

use crate::segment::Point;
use crate::tree::{Address, Connections, Station, Tree, TreeNode};
use crate::NetworkError;

/// Where to splice a LocalPoint.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionPoint {
    /// Node whose outlet receives the point, addressed in the tree as it
    /// stands when this insertion is applied
    pub target: Address,
    /// Location of the point
    pub point: Point,
    /// Name carried by the LocalPoint
    pub label: String,
}

impl InsertionPoint {
    /// Insertion at `target`.
    pub fn new(target: Address, point: Point, label: impl Into<String>) -> Self {
        Self {
            target,
            point,
            label: label.into(),
        }
    }
}

/// Apply the insertions in order and return the decorated tree.
pub fn insert_local_points(mut tree: Tree, points: &[InsertionPoint]) -> Result<Tree, NetworkError> {
    for insertion in points {
        tree = insert_one(tree, insertion)?;
    }
    Ok(tree)
}

fn insert_one(tree: Tree, insertion: &InsertionPoint) -> Result<Tree, NetworkError> {
    let target = &insertion.target;
    if !insertion.point.is_finite() {
        return Err(NetworkError::invalid_input(format!(
            "local point '{}' has non-finite coordinates",
            insertion.label
        )));
    }
    let depth = tree
        .get(target)
        .map(TreeNode::depth)
        .ok_or_else(|| NetworkError::invalid_input(format!("no node at {} to decorate", target)))?;

    let moved_root = target.left_child();
    let rebase = |address: &Address| address.rebase(target, &moved_root);

    let mut decorated = Tree::new();
    let mut moved = 0usize;
    for (address, node) in tree {
        let Some(new_id) = rebase(&address) else {
            decorated.insert_if_absent(node);
            continue;
        };
        let connections = node.connections();
        let new_connections = Connections {
            parent: new_id.parent(),
            left_child: connections.left_child.as_ref().and_then(rebase),
            right_child: connections.right_child.as_ref().and_then(rebase),
            id: new_id,
        };
        decorated.insert_if_absent(node.rekeyed(new_connections, 1));
        moved += 1;
    }

    decorated.insert_if_absent(TreeNode::LocalPoint(Station {
        connections: Connections {
            left_child: Some(moved_root),
            ..Connections::childless(target.clone())
        },
        depth,
        point: insertion.point,
        label: insertion.label.clone(),
    }));

    debug!(%target, moved, label = %insertion.label, "local point inserted");
    Ok(decorated)
}
