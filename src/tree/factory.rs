//! Node classification
//!
//! no children          → Leaf
//! children, start≠end  → Branch
//! children, start=end  → GhostBranch

use super::{Connections, Reach, TreeNode};
use crate::segment::Segment;
use crate::NetworkError;

/// Stateless chooser of the `TreeNode` variant for a claimed root.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFactory;

impl NodeFactory {
    /// Build the node for `root` given the children discovered for it.
    ///
    /// Pure: the result depends only on the arguments. Fails if the root or a
    /// child has not been placed, or a child does not sit at the canonical
    /// position below the root.
    pub fn create(
        root: &Segment,
        left: Option<&Segment>,
        right: Option<&Segment>,
    ) -> Result<TreeNode, NetworkError> {
        let (address, depth) = root.validate_placed()?;

        if left.is_none() && right.is_some() {
            return Err(NetworkError::invalid_input(format!(
                "node {} has a right child but no left child",
                address
            )));
        }
        for (child, expected) in [(left, address.left_child()), (right, address.right_child())] {
            if let Some(child) = child {
                if child.address.as_ref() != Some(&expected) {
                    return Err(NetworkError::invalid_input(format!(
                        "child of {} placed at {:?}, expected {}",
                        address, child.address, expected
                    )));
                }
            }
        }

        let connections = Connections::with_children(address.clone(), left.is_some(), right.is_some());
        let reach = Reach {
            connections,
            depth,
            start: root.start,
            end: root.end,
        };

        Ok(if left.is_none() {
            TreeNode::Leaf(reach)
        } else if root.is_ghost() {
            TreeNode::GhostBranch(reach)
        } else {
            TreeNode::Branch(reach)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Point;
    use crate::tree::{Address, NodeKind};

    fn placed_child(root: &Segment, address: Address, start: Point) -> Segment {
        let mut child = Segment::new(start, root.start);
        child.attach(root, address);
        child
    }

    #[test]
    fn test_decision_table() {
        let root = Segment::origin(Point::new(0.0, 0.0), Point::new(0.0, -1.0));
        let left = placed_child(&root, Address::root().left_child(), Point::new(1.0, 1.0));
        let right = placed_child(&root, Address::root().right_child(), Point::new(-1.0, 1.0));

        let leaf = NodeFactory::create(&root, None, None).unwrap();
        assert_eq!(leaf.kind(), NodeKind::Leaf);
        assert_eq!(leaf.children().count(), 0);

        let single = NodeFactory::create(&root, Some(&left), None).unwrap();
        assert_eq!(single.kind(), NodeKind::Branch);
        assert_eq!(single.right_child(), None);

        let branch = NodeFactory::create(&root, Some(&left), Some(&right)).unwrap();
        assert_eq!(branch.kind(), NodeKind::Branch);
        assert_eq!(branch.children().count(), 2);

        let mut ghost_root = root.clone();
        ghost_root.start = ghost_root.end;
        let ghost = NodeFactory::create(&ghost_root, Some(&left), Some(&right)).unwrap();
        assert_eq!(ghost.kind(), NodeKind::GhostBranch);
        assert_eq!(ghost.start(), ghost.end());
    }

    #[test]
    fn test_create_is_pure() {
        let root = Segment::origin(Point::new(0.0, 0.0), Point::new(0.0, -1.0));
        let left = placed_child(&root, Address::root().left_child(), Point::new(1.0, 1.0));
        let first = NodeFactory::create(&root, Some(&left), None).unwrap();
        let second = NodeFactory::create(&root, Some(&left), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_misplaced_child() {
        let root = Segment::origin(Point::new(0.0, 0.0), Point::new(0.0, -1.0));
        let wrong = placed_child(&root, Address::root().right_child(), Point::new(1.0, 1.0));
        assert!(NodeFactory::create(&root, Some(&wrong), None).is_err());
        assert!(NodeFactory::create(&Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 0.0)), None, None).is_err());
    }
}
