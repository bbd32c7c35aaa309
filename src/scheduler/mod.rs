//! Dependency-ordered simulation
//!
//! Every worker repeats, until the tree is drained:
//!   1. under the lock: find a ready node, remove it
//!   2. simulate it with its children's results (lock released)
//!   3. under the lock: record the result in the parent's ledger
//!
//! A node is ready once every child it has reported, so descendants always
//! finish before their ancestors start.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::ledger::{ChildLedger, Upstream};
use crate::tree::{Address, Tree, TreeNode};
use crate::{BoxError, EngineConfig, NetworkError};

/// Per-node computation run by the scheduler.
pub trait NodeSimulation: Sync {
    /// Value passed downstream to the parent.
    type Output: Clone + Send;
    /// Failure reported by a node.
    type Error: Into<BoxError>;

    /// Simulate one node, given the results of its children.
    fn simulate(
        &self,
        node: &TreeNode,
        upstream: Upstream<Self::Output>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Adapts a closure to [`NodeSimulation`].
pub struct FnSimulation<F, R, E> {
    simulate: F,
    _types: PhantomData<fn() -> (R, E)>,
}

impl<F, R, E> FnSimulation<F, R, E> {
    /// Wrap `simulate`.
    pub fn new(simulate: F) -> Self {
        Self {
            simulate,
            _types: PhantomData,
        }
    }
}

impl<F, R, E> std::fmt::Debug for FnSimulation<F, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSimulation").finish_non_exhaustive()
    }
}

impl<F, R, E> NodeSimulation for FnSimulation<F, R, E>
where
    R: Clone + Send,
    E: Into<BoxError>,
    F: Fn(&TreeNode, Upstream<R>) -> Result<R, E> + Sync,
{
    type Output = R;
    type Error = E;

    fn simulate(&self, node: &TreeNode, upstream: Upstream<R>) -> Result<R, E> {
        (self.simulate)(node, upstream)
    }
}

/// Outcome of a completed simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport<R> {
    /// Result of every node, by address
    pub results: BTreeMap<Address, R>,
    /// Addresses in completion order
    pub order: Vec<Address>,
    /// What is left of the tree (empty after a successful run)
    pub remaining: Tree,
}

impl<R> SimulationReport<R> {
    /// Result at the network origin.
    pub fn outlet(&self) -> Option<&R> {
        self.results.get(&Address::root())
    }
}

#[derive(Debug)]
struct Pending<R> {
    node: TreeNode,
    ledger: ChildLedger<R>,
}

#[derive(Debug)]
struct SchedulerState<R> {
    pending: BTreeMap<Address, Pending<R>>,
    results: BTreeMap<Address, R>,
    order: Vec<Address>,
    in_flight: usize,
    failure: Option<NetworkError>,
}

impl<R> SchedulerState<R> {
    fn fail(&mut self, error: NetworkError) {
        if self.failure.is_none() {
            warn!(%error, "simulation aborted");
            self.failure = Some(error);
        }
    }

    /// Remove the first ready node. Caller holds the lock.
    fn claim_ready(&mut self) -> Option<Pending<R>> {
        let address = self
            .pending
            .iter()
            .find(|(_, pending)| pending.ledger.is_ready())
            .map(|(address, _)| address.clone())?;
        self.pending.remove(&address)
    }

    /// Hand a finished node's result to its parent's ledger.
    fn notify_parent(&mut self, node: &TreeNode, result: &R) -> Result<(), NetworkError>
    where
        R: Clone,
    {
        let Some(parent) = node.parent_address() else {
            // origin: the sentinel parent lies outside the tree
            return Ok(());
        };
        let pending = self.pending.get_mut(parent).ok_or_else(|| {
            NetworkError::protocol(
                node.address().clone(),
                format!("parent {} is no longer pending", parent),
            )
        })?;
        pending.ledger.record(node.address(), result.clone())
    }
}

#[derive(Debug)]
struct Shared<R> {
    state: Mutex<SchedulerState<R>>,
    wakeup: Condvar,
}

/// Runs a [`NodeSimulation`] over a [`Tree`] bottom-up with a pool of workers.
#[derive(Debug, Clone)]
pub struct SimulationScheduler {
    config: EngineConfig,
}

impl SimulationScheduler {
    /// Create a scheduler.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Simulate every node exactly once, children before parents.
    ///
    /// The tree is consumed and drained; the first failure from any worker
    /// stops the run and is returned.
    pub fn run<S: NodeSimulation>(
        &self,
        tree: Tree,
        simulation: &S,
    ) -> Result<SimulationReport<S::Output>, NetworkError> {
        if self.config.workers == 0 {
            return Err(NetworkError::invalid_input("scheduler needs at least one worker"));
        }
        let total = tree.len();
        let pending = tree
            .into_iter()
            .map(|(address, node)| {
                let ledger = ChildLedger::for_node(&node);
                (address, Pending { node, ledger })
            })
            .collect();

        let shared = Shared {
            state: Mutex::new(SchedulerState {
                pending,
                results: BTreeMap::new(),
                order: Vec::with_capacity(total),
                in_flight: 0,
                failure: None,
            }),
            wakeup: Condvar::new(),
        };

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.workers)
                .map(|worker| {
                    let shared = &shared;
                    scope.spawn(move || self.worker_loop(worker, shared, simulation))
                })
                .collect();

            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    shared.state.lock().fail(NetworkError::WorkerPanicked {
                        phase: "simulate",
                        worker,
                    });
                }
            }
        });

        let state = shared.state.into_inner();
        if let Some(error) = state.failure {
            return Err(error);
        }
        let remaining: Tree = state.pending.into_values().map(|pending| pending.node).collect();
        if !remaining.is_empty() {
            return Err(NetworkError::IncompleteComputation {
                phase: "simulate",
                remaining: remaining.len(),
                detail: format!("{} of {} node(s) simulated", state.order.len(), total),
            });
        }

        info!(nodes = total, workers = self.config.workers, "simulation drained");
        Ok(SimulationReport {
            results: state.results,
            order: state.order,
            remaining,
        })
    }

    /// [`SimulationScheduler::run`] with a closure as the simulation.
    pub fn run_fn<R, E, F>(&self, tree: Tree, simulate: F) -> Result<SimulationReport<R>, NetworkError>
    where
        R: Clone + Send,
        E: Into<BoxError>,
        F: Fn(&TreeNode, Upstream<R>) -> Result<R, E> + Sync,
    {
        self.run(tree, &FnSimulation::new(simulate))
    }

    fn worker_loop<S: NodeSimulation>(
        &self,
        worker: usize,
        shared: &Shared<S::Output>,
        simulation: &S,
    ) {
        while let Some(Pending { node, ledger }) = self.next_ready(worker, shared) {
            let mut in_flight = InFlight {
                shared,
                finished: false,
            };
            let address = node.address().clone();
            debug!(worker, %address, kind = ?node.kind(), "simulating");

            let outcome = simulation.simulate(&node, ledger.into_upstream());

            let mut state = shared.state.lock();
            state.in_flight -= 1;
            in_flight.finished = true;
            match outcome {
                Ok(result) => match state.notify_parent(&node, &result) {
                    Ok(()) => {
                        state.results.insert(address.clone(), result);
                        state.order.push(address);
                    }
                    Err(error) => state.fail(error),
                },
                Err(error) => state.fail(NetworkError::Simulation {
                    address,
                    source: error.into(),
                }),
            }
            shared.wakeup.notify_all();
        }
    }

    /// Wait until a node is ready. `None` means stop.
    fn next_ready<R>(&self, worker: usize, shared: &Shared<R>) -> Option<Pending<R>> {
        let mut state = shared.state.lock();
        loop {
            if state.failure.is_some() || state.pending.is_empty() {
                shared.wakeup.notify_all();
                return None;
            }
            if let Some(pending) = state.claim_ready() {
                state.in_flight += 1;
                return Some(pending);
            }
            if state.in_flight == 0 {
                let remaining = state.pending.len();
                state.fail(NetworkError::IncompleteComputation {
                    phase: "simulate",
                    remaining,
                    detail: "no node can become ready".to_string(),
                });
                shared.wakeup.notify_all();
                return None;
            }
            trace!(worker, "nothing ready, waiting");
            shared.wakeup.wait_for(&mut state, self.config.idle_backoff);
        }
    }
}

/// Releases a claimed node if the simulation unwinds.
struct InFlight<'a, R> {
    shared: &'a Shared<R>,
    finished: bool,
}

impl<R> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.shared.state.lock();
        state.in_flight -= 1;
        let remaining = state.pending.len();
        state.fail(NetworkError::IncompleteComputation {
            phase: "simulate",
            remaining,
            detail: "a simulation panicked".to_string(),
        });
        self.shared.wakeup.notify_all();
    }
}
