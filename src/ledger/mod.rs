//! Per-node completion ledger
//!
//! Tracks which expected children have reported, and holds their results
//! until the node itself is claimed.
//! Ready ⇔ every expected child has reported.

use crate::tree::{Address, NodeKind, TreeNode};
use crate::NetworkError;

/// Completion slot for one expected child.
#[derive(Debug, Clone)]
struct ChildSlot<R> {
    address: Address,
    result: Option<R>,
}

/// Results collected from a node's children, handed to its simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Upstream<R> {
    /// Left child address and result.
    pub left: Option<(Address, R)>,
    /// Right child address and result.
    pub right: Option<(Address, R)>,
}

impl<R> Upstream<R> {
    /// No upstream results (headwater).
    pub fn none() -> Self {
        Self {
            left: None,
            right: None,
        }
    }

    /// Child results, left first.
    pub fn results(&self) -> impl Iterator<Item = &R> {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|(_, result)| result)
    }

    /// Number of reported children.
    pub fn len(&self) -> usize {
        self.left.is_some() as usize + self.right.is_some() as usize
    }

    /// Whether no child reported (always true for leaves).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completion record of a pending node.
#[derive(Debug, Clone)]
pub struct ChildLedger<R> {
    owner: Address,
    kind: NodeKind,
    left: Option<ChildSlot<R>>,
    right: Option<ChildSlot<R>>,
}

impl<R> ChildLedger<R> {
    /// Ledger expecting exactly the node's present children.
    pub fn for_node(node: &TreeNode) -> Self {
        let slot = |address: Option<&Address>| {
            address.map(|address| ChildSlot {
                address: address.clone(),
                result: None,
            })
        };
        Self {
            owner: node.address().clone(),
            kind: node.kind(),
            left: slot(node.left_child()),
            right: slot(node.right_child()),
        }
    }

    /// Record a child's completion.
    ///
    /// Fails on a leaf, on an address that is not an expected child, and on
    /// a second report from the same child.
    pub fn record(&mut self, child: &Address, result: R) -> Result<(), NetworkError> {
        if self.kind == NodeKind::Leaf {
            return Err(NetworkError::protocol(
                self.owner.clone(),
                format!("leaf notified by {}", child),
            ));
        }

        let slot = [self.left.as_mut(), self.right.as_mut()]
            .into_iter()
            .flatten()
            .find(|slot| slot.address == *child)
            .ok_or_else(|| {
                NetworkError::protocol(self.owner.clone(), format!("unexpected child {}", child))
            })?;

        if slot.result.is_some() {
            return Err(NetworkError::protocol(
                self.owner.clone(),
                format!("child {} reported twice", child),
            ));
        }
        slot.result = Some(result);
        Ok(())
    }

    /// Whether all expected children have reported.
    pub fn is_ready(&self) -> bool {
        [&self.left, &self.right]
            .into_iter()
            .flatten()
            .all(|slot| slot.result.is_some())
    }

    /// Number of children still outstanding.
    pub fn outstanding(&self) -> usize {
        [&self.left, &self.right]
            .into_iter()
            .flatten()
            .filter(|slot| slot.result.is_none())
            .count()
    }

    /// Release collected results.
    pub fn into_upstream(self) -> Upstream<R> {
        let take = |slot: Option<ChildSlot<R>>| {
            slot.and_then(|slot| slot.result.map(|result| (slot.address, result)))
        };
        Upstream {
            left: take(self.left),
            right: take(self.right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Point;
    use crate::tree::{Connections, Reach};

    fn addr(index: u64) -> Address {
        Address::from_index(index).unwrap()
    }

    fn node(index: u64, left: bool, right: bool) -> TreeNode {
        let reach = Reach {
            connections: Connections::with_children(addr(index), left, right),
            depth: 1,
            start: Point::new(0.0, 0.0),
            end: Point::new(0.0, -1.0),
        };
        if left {
            TreeNode::Branch(reach)
        } else {
            TreeNode::Leaf(reach)
        }
    }

    #[test]
    fn test_ready_after_both_children() {
        let mut ledger = ChildLedger::for_node(&node(1, true, true));
        assert!(!ledger.is_ready());
        assert_eq!(ledger.outstanding(), 2);

        ledger.record(&addr(3), 30).unwrap();
        assert!(!ledger.is_ready(), "only right reported");

        ledger.record(&addr(2), 20).unwrap();
        assert!(ledger.is_ready());

        let upstream = ledger.into_upstream();
        assert_eq!(upstream.left, Some((addr(2), 20)));
        assert_eq!(upstream.right, Some((addr(3), 30)));
        assert_eq!(upstream.results().sum::<i32>(), 50);
    }

    #[test]
    fn test_single_child_readiness() {
        let mut ledger = ChildLedger::for_node(&node(2, true, false));
        ledger.record(&addr(4), ()).unwrap();
        assert!(ledger.is_ready());
        assert_eq!(ledger.into_upstream().len(), 1);
    }

    #[test]
    fn test_protocol_violations() {
        let mut leaf = ChildLedger::for_node(&node(2, false, false));
        assert!(leaf.is_ready());
        assert!(matches!(
            leaf.record(&addr(4), 1),
            Err(NetworkError::ProtocolViolation { .. })
        ));

        let mut branch = ChildLedger::for_node(&node(1, true, true));
        assert!(branch.record(&addr(5), 1).is_err(), "5 is not a child of 1");
        branch.record(&addr(2), 1).unwrap();
        assert!(branch.record(&addr(2), 1).is_err(), "duplicate report");
    }
}
