//! Shared fixtures: scenario networks and random drainage topologies

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use confluence::{Address, EngineConfig, Point, Segment, SegmentPool};

pub fn addr(index: u64) -> Address {
    Address::from_index(index).expect("non-zero address")
}

pub fn config(workers: usize) -> EngineConfig {
    EngineConfig::with_workers(workers).expect("valid worker count")
}

pub fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

/// Origin `(0,0)→(0,-1)` with the given tributary starts all draining into `(0,0)`.
pub fn fan_in_network(tributary_starts: &[(f64, f64)]) -> Vec<Segment> {
    let outlet = Point::new(0.0, 0.0);
    let mut segments = vec![Segment::origin(outlet, Point::new(0.0, -1.0))];
    segments.extend(
        tributary_starts
            .iter()
            .map(|&(x, y)| Segment::new(Point::new(x, y), outlet)),
    );
    segments
}

pub fn scenario_a() -> Vec<Segment> {
    fan_in_network(&[(1.0, 1.0), (-1.0, 1.0)])
}

pub fn scenario_b() -> Vec<Segment> {
    fan_in_network(&[(1.0, 1.0), (0.0, 1.0), (-1.0, 1.0)])
}

pub fn scenario_c() -> Vec<Segment> {
    fan_in_network(&[])
}

/// Random drainage network described by each segment's downstream neighbour.
#[derive(Debug, Clone)]
pub struct Network {
    /// `parents[i]` is the segment that segment `i + 1` drains into
    pub parents: Vec<usize>,
}

impl Network {
    /// Segment 0 is the origin; segment `i` starts at a unique point and ends
    /// at the start of its parent.
    pub fn segments(&self) -> Vec<Segment> {
        let start = |i: usize| Point::new(i as f64 + 1.0, 0.5 * i as f64);
        let mut segments = vec![Segment::origin(start(0), Point::new(-1.0, -1.0))];
        for (offset, &parent) in self.parents.iter().enumerate() {
            let id = offset + 1;
            segments.push(Segment::new(start(id), start(parent)));
        }
        segments
    }

    pub fn pool(&self) -> SegmentPool {
        SegmentPool::from_segments(self.segments()).expect("generated network is valid")
    }

    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    /// Ghosts the builder must synthesize: `k - 2` for a confluence of `k ≥ 3`.
    pub fn expected_ghosts(&self) -> usize {
        let mut fan_in = vec![0usize; self.len()];
        for &parent in &self.parents {
            fan_in[parent] += 1;
        }
        fan_in.iter().map(|&k| k.saturating_sub(2)).sum()
    }
}

/// Long single-thread chain plus a wide fan at the head, for benches.
pub fn comb(length: usize, fan: usize) -> Network {
    let mut parents: Vec<usize> = (0..length).collect();
    parents.extend(std::iter::repeat(length).take(fan));
    Network { parents }
}
