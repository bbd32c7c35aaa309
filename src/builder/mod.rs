//! Concurrent tree construction
//!
//! Every worker repeats, until the pool is empty:
//!   1. claim the first root (`is_origin`) in the pool        ┐ one short
//!   2. find up to three unplaced tributaries of it            │ critical
//!   3. place them at 2a / 2a+1; with ≥3, clone the second into│ section
//!      a ghost (start := end) and re-insert it as a new root  ┘
//!   4. classify with `NodeFactory` and commit to the tree     (unlocked)
//!
//! Pool shrinks by one per claim and grows by at most one (a ghost), so a
//! finite acyclic pool drains.

use std::collections::BTreeMap;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::segment::{Segment, SegmentId, SegmentPool};
use crate::tree::{Address, NodeFactory, Tree};
use crate::{EngineConfig, NetworkError};

/// Tributaries inspected per claim; a third one triggers a ghost.
const MAX_TRIBUTARIES: usize = 3;

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The finished tree
    pub tree: Tree,
    /// Segments in the input pool
    pub segments_consumed: usize,
    /// Synthetic ghost segments created to binarize confluences
    pub ghosts_inserted: usize,
}

/// Work handed from the critical section to the unlocked commit step.
#[derive(Debug)]
struct Claim {
    root: Segment,
    left: Option<Segment>,
    right: Option<Segment>,
}

#[derive(Debug)]
struct BuildState {
    pool: BTreeMap<SegmentId, Segment>,
    /// Id given to the next ghost; above every input id.
    next_ghost_id: SegmentId,
    ghosts_inserted: usize,
    in_flight: usize,
    failure: Option<NetworkError>,
}

impl BuildState {
    fn fail(&mut self, error: NetworkError) {
        if self.failure.is_none() {
            warn!(%error, "build aborted");
            self.failure = Some(error);
        }
    }

    /// Steps 1–3. Caller holds the pool lock.
    fn claim(&mut self) -> Option<Claim> {
        let root_id = self
            .pool
            .iter()
            .find(|(_, segment)| segment.is_origin)
            .map(|(&id, _)| id)?;
        let root = self.pool.remove(&root_id)?;
        let Some(address) = root.address.clone() else {
            // NodeFactory rejects the unplaced root
            return Some(Claim {
                root,
                left: None,
                right: None,
            });
        };

        let tributaries: Vec<SegmentId> = self
            .pool
            .iter()
            .filter(|(_, segment)| !segment.is_origin && segment.is_tributary_of(&root))
            .map(|(&id, _)| id)
            .take(MAX_TRIBUTARIES)
            .collect();

        let left = match tributaries.first() {
            Some(&id) => self.place(id, &root, address.left_child()),
            None => None,
        };
        let right = match tributaries.as_slice() {
            [_, second] => self.place(*second, &root, address.right_child()),
            [_, second, _] => self.insert_ghost(*second, &root, address.right_child()),
            _ => None,
        };

        Some(Claim { root, left, right })
    }

    /// Attach a pooled tributary below `root`; it stays pooled as a new root.
    fn place(&mut self, id: SegmentId, root: &Segment, address: Address) -> Option<Segment> {
        let segment = self.pool.get_mut(&id)?;
        segment.attach(root, address);
        Some(segment.clone())
    }

    /// Clone tributary `id` into a zero-length ghost placed below `root`.
    ///
    /// The tributary itself stays unplaced; the ghost picks it up together
    /// with the remaining tributaries of the confluence once claimed.
    fn insert_ghost(&mut self, id: SegmentId, root: &Segment, address: Address) -> Option<Segment> {
        let mut ghost = self.pool.get(&id)?.clone();
        let ghost_id = self.next_ghost_id;
        debug!(ghost_id, tributary = id, %address, "ghost inserted");

        ghost.start = ghost.end;
        ghost.attach(root, address);
        self.next_ghost_id += 1;
        self.ghosts_inserted += 1;
        self.pool.insert(ghost_id, ghost.clone());
        Some(ghost)
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<BuildState>,
    wakeup: Condvar,
    tree: Mutex<Tree>,
}

/// Builds a [`Tree`] from a [`SegmentPool`] with a pool of workers.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    config: EngineConfig,
}

impl TreeBuilder {
    /// Create a builder.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Consume the pool and return the finished tree.
    ///
    /// Fails with `IncompleteComputation` if segments remain that are not
    /// reachable from the origin, or if nothing was produced.
    pub fn build(&self, pool: SegmentPool) -> Result<BuildReport, NetworkError> {
        if self.config.workers == 0 {
            return Err(NetworkError::invalid_input("builder needs at least one worker"));
        }
        let segments = pool.len();
        let pool = pool.into_inner();
        let next_ghost_id = pool.keys().next_back().map_or(0, |&id| id + 1);

        let shared = Shared {
            state: Mutex::new(BuildState {
                pool,
                next_ghost_id,
                ghosts_inserted: 0,
                in_flight: 0,
                failure: None,
            }),
            wakeup: Condvar::new(),
            tree: Mutex::new(Tree::new()),
        };

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.workers)
                .map(|worker| {
                    let shared = &shared;
                    scope.spawn(move || self.worker_loop(worker, shared))
                })
                .collect();

            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    shared.state.lock().fail(NetworkError::WorkerPanicked {
                        phase: "build",
                        worker,
                    });
                }
            }
        });

        let state = shared.state.into_inner();
        let tree = shared.tree.into_inner();
        if let Some(error) = state.failure {
            return Err(error);
        }
        if tree.is_empty() || !state.pool.is_empty() {
            return Err(NetworkError::IncompleteComputation {
                phase: "build",
                remaining: state.pool.len(),
                detail: format!("{} node(s) built", tree.len()),
            });
        }

        info!(
            segments,
            ghosts = state.ghosts_inserted,
            nodes = tree.len(),
            depth = tree.max_depth(),
            "tree built"
        );
        Ok(BuildReport {
            tree,
            segments_consumed: segments,
            ghosts_inserted: state.ghosts_inserted,
        })
    }

    fn worker_loop(&self, worker: usize, shared: &Shared) {
        while let Some(claim) = self.next_claim(worker, shared) {
            let _in_flight = InFlight { shared };
            let outcome = NodeFactory::create(&claim.root, claim.left.as_ref(), claim.right.as_ref());

            match outcome {
                Ok(node) => {
                    debug!(worker, node = %node, "committed");
                    if !shared.tree.lock().insert_if_absent(node) {
                        debug!(worker, "address already committed");
                    }
                }
                Err(error) => shared.state.lock().fail(error),
            }
        }
    }

    /// Wait until a root can be claimed. `None` means stop.
    fn next_claim(&self, worker: usize, shared: &Shared) -> Option<Claim> {
        let mut state = shared.state.lock();
        loop {
            if state.failure.is_some() || state.pool.is_empty() {
                shared.wakeup.notify_all();
                return None;
            }
            if let Some(claim) = state.claim() {
                state.in_flight += 1;
                return Some(claim);
            }
            if state.in_flight == 0 {
                let remaining = state.pool.len();
                state.fail(NetworkError::IncompleteComputation {
                    phase: "build",
                    remaining,
                    detail: "no segment connects to the placed network".to_string(),
                });
                shared.wakeup.notify_all();
                return None;
            }
            trace!(worker, "no claimable root, waiting");
            shared.wakeup.wait_for(&mut state, self.config.idle_backoff);
        }
    }
}

/// Marks one claim as finished when dropped, also when the worker unwinds.
struct InFlight<'a> {
    shared: &'a Shared,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.in_flight -= 1;
        if std::thread::panicking() {
            let remaining = state.pool.len();
            state.fail(NetworkError::IncompleteComputation {
                phase: "build",
                remaining,
                detail: "a worker unwound mid-claim".to_string(),
            });
        }
        self.shared.wakeup.notify_all();
    }
}
