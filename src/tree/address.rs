//! Implicit binary-tree addressing
//!
//! Address = 1-based heap index:
//!   parent(a)      = ⌊a / 2⌋
//!   left_child(a)  = 2a
//!   right_child(a) = 2a + 1
//!
//! Stored as the bit path below the root (leading 1 implicit), so the
//! arithmetic never overflows however deep the drainage network is.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bitvec::prelude::*;

use crate::NetworkError;

/// Position of a node in the implicit binary tree.
///
/// Bit `i` of `path` is the branch taken at depth `i + 1`
/// (`false` = left, `true` = right). The root has an empty path.
#[derive(Clone)]
pub struct Address {
    path: BitVec,
}

impl Address {
    /// The network origin (heap index 1).
    pub fn root() -> Self {
        Self {
            path: BitVec::new(),
        }
    }

    /// Build an address from its integer heap index.
    ///
    /// Index `0` is the sentinel parent of the origin and is not a valid
    /// node position.
    pub fn from_index(index: u64) -> Result<Self, NetworkError> {
        if index == 0 {
            return Err(NetworkError::invalid_input("address 0 is not a node position"));
        }
        let width = 64 - index.leading_zeros() as usize;
        let mut path: BitVec = BitVec::with_capacity(width - 1);
        for bit in (0..width - 1).rev() {
            path.push((index >> bit) & 1 == 1);
        }
        Ok(Self { path })
    }

    /// Integer heap index, if it fits in a `u64`.
    pub fn to_index(&self) -> Option<u64> {
        if self.path.len() >= 64 {
            return None;
        }
        Some(
            self.path
                .iter()
                .by_vals()
                .fold(1u64, |acc, bit| acc << 1 | bit as u64),
        )
    }

    /// Whether this is the network origin.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of edges between this address and the root.
    #[inline]
    pub fn level(&self) -> usize {
        self.path.len()
    }

    /// `⌊a / 2⌋`, or `None` for the root (whose parent is the sentinel).
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut path = self.path.clone();
        path.pop();
        Some(Self { path })
    }

    /// `2a`
    pub fn left_child(&self) -> Self {
        self.child(false)
    }

    /// `2a + 1`
    pub fn right_child(&self) -> Self {
        self.child(true)
    }

    fn child(&self, right: bool) -> Self {
        let mut path: BitVec = BitVec::with_capacity(self.path.len() + 1);
        path.extend_from_bitslice(self.path.as_bitslice());
        path.push(right);
        Self { path }
    }

    /// Even addresses are left children.
    ///
    /// The root (index 1) is odd.
    pub fn is_even(&self) -> bool {
        matches!(self.path.last().map(|bit| *bit), Some(false))
    }

    /// Whether `self` lies in the subtree rooted at `ancestor` (inclusive).
    pub fn is_within(&self, ancestor: &Address) -> bool {
        self.path.starts_with(ancestor.path.as_bitslice())
    }

    /// Move this address from the subtree at `from` to the subtree at `to`,
    /// keeping the relative path below the subtree root.
    ///
    /// Returns `None` if `self` is not inside `from`.
    pub fn rebase(&self, from: &Address, to: &Address) -> Option<Self> {
        if !self.is_within(from) {
            return None;
        }
        let mut path: BitVec = BitVec::with_capacity(to.path.len() + self.path.len() - from.path.len());
        path.extend_from_bitslice(to.path.as_bitslice());
        path.extend_from_bitslice(&self.path[from.path.len()..]);
        Some(Self { path })
    }

    fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        std::iter::once(true).chain(self.path.iter().by_vals())
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.path.len() == other.path.len() && self.path.iter().by_vals().eq(other.path.iter().by_vals())
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.len().hash(state);
        for bit in self.path.iter().by_vals() {
            bit.hash(state);
        }
    }
}

impl Ord for Address {
    /// Integer order: a longer path is a larger number, equal lengths
    /// compare bit by bit from the most significant end.
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .len()
            .cmp(&other.path.len())
            .then_with(|| self.path.iter().by_vals().cmp(other.path.iter().by_vals()))
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    /// Lower-case hexadecimal of the heap index.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.path.len() + 1;
        let pad = (4 - width % 4) % 4;
        let bits: Vec<bool> = std::iter::repeat(false).take(pad).chain(self.bits()).collect();
        let digits: String = bits
            .chunks(4)
            .map(|nibble| {
                let value = nibble.iter().fold(0u32, |acc, &bit| acc << 1 | bit as u32);
                std::char::from_digit(value, 16).unwrap_or('?')
            })
            .collect();
        write!(f, "0x{}", digits)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_index() {
            Some(index) => write!(f, "Address({})", index),
            None => write!(f, "Address({})", self),
        }
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(index: u64) -> Address {
        Address::from_index(index).unwrap()
    }

    #[test]
    fn test_heap_arithmetic() {
        let a = addr(5);
        assert_eq!(a.left_child(), addr(10));
        assert_eq!(a.right_child(), addr(11));
        assert_eq!(a.parent(), Some(addr(2)));
        assert_eq!(addr(11).parent(), Some(a));
        assert_eq!(Address::root().parent(), None);
    }

    #[test]
    fn test_index_round_trip_and_zero() {
        for index in [1u64, 2, 3, 6, 7, 255, 1 << 40] {
            assert_eq!(addr(index).to_index(), Some(index));
        }
        assert!(Address::from_index(0).is_err());
    }

    #[test]
    fn test_integer_ordering() {
        let mut addrs: Vec<Address> = [9u64, 1, 3, 2, 16, 15, 4].iter().map(|&i| addr(i)).collect();
        addrs.sort();
        let sorted: Vec<u64> = addrs.iter().filter_map(Address::to_index).collect();
        assert_eq!(sorted, vec![1, 2, 3, 4, 9, 15, 16]);
    }

    #[test]
    fn test_parity() {
        assert!(addr(2).is_even());
        assert!(!addr(3).is_even());
        assert!(!Address::root().is_even());
    }

    #[test]
    fn test_deep_address_does_not_overflow() {
        let mut a = Address::root();
        for _ in 0..200 {
            a = a.right_child();
        }
        assert_eq!(a.level(), 200);
        assert_eq!(a.to_index(), None);
        assert_eq!(a.parent().map(|p| p.level()), Some(199));
    }

    #[test]
    fn test_hex_display() {
        assert_eq!(addr(1).to_string(), "0x1");
        assert_eq!(addr(26).to_string(), "0x1a");
        assert_eq!(addr(255).to_string(), "0xff");
        assert_eq!(addr(256).to_string(), "0x100");
    }

    #[test]
    fn test_rebase_subtree() {
        // 11 = 0b1011 sits under 5 = 0b101; moving 5 to 10 gives 0b10101 = 21
        assert_eq!(addr(11).rebase(&addr(5), &addr(10)), Some(addr(21)));
        assert_eq!(addr(5).rebase(&addr(5), &addr(10)), Some(addr(10)));
        assert_eq!(addr(6).rebase(&addr(5), &addr(10)), None);
    }
}
