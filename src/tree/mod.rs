//! Binary drainage tree
//!
//! Address → TreeNode map produced by the builder. Handed out by value;
//! the scheduler consumes its own copy and drains it.

mod address;
mod factory;
mod node;

pub use address::Address;
pub use factory::NodeFactory;
pub use node::{Connections, NodeKind, Reach, Station, TreeNode};

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::NetworkError;

/// Drainage tree keyed by address.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Tree {
    nodes: BTreeMap<Address, TreeNode>,
}

impl Tree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keyed by the node's own address.
    ///
    /// Returns `false` (and drops `node`) if the address is already taken.
    pub fn insert_if_absent(&mut self, node: TreeNode) -> bool {
        match self.nodes.entry(node.address().clone()) {
            Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Node at `address`.
    pub fn get(&self, address: &Address) -> Option<&TreeNode> {
        self.nodes.get(address)
    }

    /// Remove and return the node at `address`.
    pub fn remove(&mut self, address: &Address) -> Option<TreeNode> {
        self.nodes.remove(address)
    }

    /// The origin node, if present.
    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.get(&Address::root())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in address order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    /// Number of nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.iter().filter(|node| node.kind() == kind).count()
    }

    /// Largest depth in the tree.
    pub fn max_depth(&self) -> u32 {
        self.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Take the address-ordered map.
    pub fn into_nodes(self) -> BTreeMap<Address, TreeNode> {
        self.nodes
    }

    /// Check the structural invariants of a finished tree:
    /// heap arithmetic on every node, children present, ghost signature only
    /// on ghosts, and a single origin.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.is_empty() {
            return Err(NetworkError::IncompleteComputation {
                phase: "validate",
                remaining: 0,
                detail: "tree is empty".to_string(),
            });
        }
        if self.root().is_none() {
            return Err(NetworkError::invalid_input("tree has no node at address 1"));
        }

        for node in self.iter() {
            let address = node.address();
            if !node.connections().is_consistent() {
                return Err(NetworkError::protocol(
                    address.clone(),
                    "connections do not follow the 2a / 2a+1 layout",
                ));
            }
            if let Some(parent) = node.parent_address() {
                if !self.nodes.contains_key(parent) {
                    return Err(NetworkError::protocol(address.clone(), "parent missing from tree"));
                }
            }
            for child in node.children() {
                if !self.nodes.contains_key(child) {
                    return Err(NetworkError::protocol(
                        address.clone(),
                        format!("child {} missing from tree", child),
                    ));
                }
            }
            let zero_length = node.start() == node.end();
            match node.kind() {
                NodeKind::GhostBranch if !zero_length => {
                    return Err(NetworkError::protocol(address.clone(), "ghost with non-zero length"))
                }
                NodeKind::Leaf | NodeKind::Branch if zero_length => {
                    return Err(NetworkError::protocol(address.clone(), "zero-length real segment"))
                }
                NodeKind::Leaf if node.children().next().is_some() => {
                    return Err(NetworkError::protocol(address.clone(), "leaf with children"))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Content hash of the tree in address order.
    ///
    /// Equal fingerprints mean structurally identical trees, which makes
    /// build determinism easy to check across runs and worker counts.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for node in self.iter() {
            hasher.update(node.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }
}

impl FromIterator<TreeNode> for Tree {
    fn from_iter<I: IntoIterator<Item = TreeNode>>(iter: I) -> Self {
        let mut tree = Tree::new();
        for node in iter {
            tree.insert_if_absent(node);
        }
        tree
    }
}

impl IntoIterator for Tree {
    type Item = (Address, TreeNode);
    type IntoIter = std::collections::btree_map::IntoIter<Address, TreeNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}
