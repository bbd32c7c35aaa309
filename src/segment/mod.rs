//! Raw river-segment records and the input pool
//!
//! A segment runs from `start` (upstream) to `end` (downstream).
//! Tributary rule: `child.end == parent.start`.

mod reader;

pub use reader::read_segments;

use std::collections::BTreeMap;
use std::fmt;

use crate::tree::Address;
use crate::NetworkError;

/// Planar point in source-data units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Point {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Identifier handed out by the input collaborator.
///
/// Pool scans visit segments in ascending id order, which makes
/// "first found" deterministic.
pub type SegmentId = u64;

/// Input record for one river segment.
///
/// Only the origin arrives with `address`/`depth` populated; the builder
/// fills them in for every other segment as it is discovered.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Tree position, once assigned.
    pub address: Option<Address>,
    /// Parent position; `None` with an address set means the outlet sentinel.
    pub parent_address: Option<Address>,
    /// Depth below the outlet (origin = 1).
    pub depth: Option<u32>,
    /// Claimable as a root.
    pub is_origin: bool,
    /// Upstream end
    pub start: Point,
    /// Downstream end
    pub end: Point,
}

impl Segment {
    /// An unplaced segment.
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            address: None,
            parent_address: None,
            depth: None,
            is_origin: false,
            start,
            end,
        }
    }

    /// The network origin: address 1, sentinel parent, depth 1.
    pub fn origin(start: Point, end: Point) -> Self {
        Self {
            address: Some(Address::root()),
            parent_address: None,
            depth: Some(1),
            is_origin: true,
            start,
            end,
        }
    }

    /// Zero-length segment, the signature of a synthetic merge node.
    pub fn is_ghost(&self) -> bool {
        self.start == self.end
    }

    /// Whether `self` drains into `root`.
    pub fn is_tributary_of(&self, root: &Segment) -> bool {
        self.end == root.start
    }

    /// Turn this segment into a placed child of `parent`.
    pub(crate) fn attach(&mut self, parent: &Segment, address: Address) {
        self.parent_address = parent.address.clone();
        self.depth = parent.depth.map(|depth| depth + 1);
        self.address = Some(address);
        self.is_origin = true;
    }

    /// Length of the segment.
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Check the per-segment invariants a placed segment must satisfy.
    pub fn validate_placed(&self) -> Result<(&Address, u32), NetworkError> {
        let address = self
            .address
            .as_ref()
            .ok_or_else(|| NetworkError::invalid_input("claimed segment has no address"))?;
        let depth = self
            .depth
            .ok_or_else(|| NetworkError::invalid_input(format!("segment {} has no depth", address)))?;
        if address.parent() != self.parent_address {
            return Err(NetworkError::invalid_input(format!(
                "segment {} has parent {:?}, expected {:?}",
                address,
                self.parent_address,
                address.parent()
            )));
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(NetworkError::invalid_input(format!(
                "segment {} has non-finite coordinates",
                address
            )));
        }
        Ok((address, depth))
    }
}

/// Validated collection of input segments.
#[derive(Debug, Clone, Default)]
pub struct SegmentPool {
    segments: BTreeMap<SegmentId, Segment>,
}

impl SegmentPool {
    /// Check the input contract and wrap the segments.
    ///
    /// Requires a non-empty map with exactly one origin carrying address 1,
    /// the sentinel parent and depth 1, and finite coordinates everywhere.
    /// Zero-length segments are rejected: `start == end` marks a ghost.
    pub fn new(segments: BTreeMap<SegmentId, Segment>) -> Result<Self, NetworkError> {
        if segments.is_empty() {
            return Err(NetworkError::invalid_input("segment pool is empty"));
        }

        let origins: Vec<SegmentId> = segments
            .iter()
            .filter(|(_, segment)| segment.is_origin)
            .map(|(&id, _)| id)
            .collect();
        let origin_id = match origins.as_slice() {
            [id] => *id,
            [] => return Err(NetworkError::invalid_input("no origin segment")),
            many => {
                return Err(NetworkError::invalid_input(format!(
                    "{} origin segments (ids {:?}), expected exactly one",
                    many.len(),
                    many
                )))
            }
        };

        let origin = &segments[&origin_id];
        if origin.address.as_ref().map_or(true, |a| !a.is_root())
            || origin.parent_address.is_some()
            || origin.depth != Some(1)
        {
            return Err(NetworkError::invalid_input(format!(
                "origin segment {} must have address 1, parent 0 and depth 1",
                origin_id
            )));
        }

        for (id, segment) in &segments {
            if !segment.start.is_finite() || !segment.end.is_finite() {
                return Err(NetworkError::invalid_input(format!(
                    "segment {} has non-finite coordinates",
                    id
                )));
            }
            if segment.is_ghost() {
                return Err(NetworkError::invalid_input(format!(
                    "segment {} has zero length ({} -> {})",
                    id, segment.start, segment.end
                )));
            }
            if *id != origin_id && segment.address.is_some() {
                return Err(NetworkError::invalid_input(format!(
                    "segment {} is pre-addressed but is not the origin",
                    id
                )));
            }
        }

        Ok(Self { segments })
    }

    /// Build a pool from segments numbered in iteration order.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Result<Self, NetworkError> {
        Self::new((0..).zip(segments).collect())
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the pool holds no segments (never true for a validated pool).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SegmentId, &Segment)> {
        self.segments.iter()
    }

    pub(crate) fn into_inner(self) -> BTreeMap<SegmentId, Segment> {
        self.segments
    }
}
