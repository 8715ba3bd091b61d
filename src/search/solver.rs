//! Chronological backtracking over decision points.

use super::config::SolverConfig;
use super::decision::DecisionPoint;
use super::manager::DecisionManager;
use crate::error::SearchError;
use crate::plan::PlanDatabase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Why a search run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStatus {
    /// No flaw remains; the database holds a complete plan.
    Solved,
    /// Every choice of every decision failed.
    Exhausted,
    StepLimit,
    DepthLimit,
    Timeout,
    Cancelled,
}

/// Result of a search run.
#[derive(Debug, Clone)]
pub struct SolverResult {
    pub status: SolverStatus,

    /// Decision points opened.
    pub steps: usize,

    /// Depth of the decision stack when the run stopped.
    pub depth: usize,

    /// Decision points abandoned after all their choices failed.
    pub backtracks: usize,

    /// Wall-clock time of the run in milliseconds.
    pub elapsed_ms: u64,
}

impl SolverResult {
    pub fn is_solved(&self) -> bool {
        self.status == SolverStatus::Solved
    }
}

/// Depth-first search driven by a [`DecisionManager`].
///
/// Each step opens the next decision, commits its first choice that
/// propagates, and on failure retracts back to the most recent decision
/// with choices left. Committed choices stay in the database between
/// runs; [`Solver::reset`] retracts them all.
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::Domain;
/// use u_plansearch::heuristics::{HeuristicsConfig, HeuristicsEngine};
/// use u_plansearch::network::NotEqual;
/// use u_plansearch::plan::{PlanDatabase, SimpleSchema};
/// use u_plansearch::search::{DecisionConfig, DecisionManager, Solver, SolverConfig, SolverStatus};
///
/// let mut db = PlanDatabase::new(SimpleSchema::new());
/// let x = db.create_global_variable("x", Domain::numbers([1.0, 2.0]), true);
/// let y = db.create_global_variable("y", Domain::numbers([1.0, 2.0]), true);
/// db.engine_mut().add_constraint(NotEqual, vec![x, y]).unwrap();
///
/// let heuristics = HeuristicsEngine::new(HeuristicsConfig::default()).unwrap();
/// let manager = DecisionManager::new(&mut db, heuristics, DecisionConfig::default()).unwrap();
/// let mut solver = Solver::new(SolverConfig::default(), manager);
///
/// let result = solver.run(&mut db).unwrap();
/// assert_eq!(result.status, SolverStatus::Solved);
/// assert!(db.engine().variable(x).unwrap().derived().is_singleton());
/// ```
#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    manager: DecisionManager,
    stack: Vec<DecisionPoint>,
    steps: usize,
    backtracks: usize,
}

impl Solver {
    pub fn new(config: SolverConfig, manager: DecisionManager) -> Self {
        Self {
            config,
            manager,
            stack: Vec::new(),
            steps: 0,
            backtracks: 0,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn manager(&self) -> &DecisionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut DecisionManager {
        &mut self.manager
    }

    /// Open decisions, oldest first.
    pub fn stack(&self) -> &[DecisionPoint] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Searches until solved, exhausted, or a budget runs out.
    pub fn run(&mut self, db: &mut PlanDatabase) -> Result<SolverResult, SearchError> {
        self.run_with_cancel(db, None)
    }

    /// Runs the search with an optional cancellation token.
    ///
    /// A run resumes from the current stack, so a run stopped by a budget
    /// can be continued with another call. Steps and backtracks count
    /// from the first run after the last [`reset`](Self::reset).
    pub fn run_with_cancel(
        &mut self,
        db: &mut PlanDatabase,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<SolverResult, SearchError> {
        let started = Instant::now();
        info!(
            depth = self.stack.len(),
            max_steps = self.config.max_steps,
            max_depth = self.config.max_depth,
            timeout_ms = self.config.timeout_ms,
            "search started"
        );

        let status = loop {
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    break SolverStatus::Cancelled;
                }
            }
            if self.config.timeout_ms > 0
                && started.elapsed().as_millis() >= u128::from(self.config.timeout_ms)
            {
                break SolverStatus::Timeout;
            }

            let point = match self.manager.next_decision(db) {
                Ok(Some(point)) => point,
                Ok(None) => break SolverStatus::Solved,
                Err(SearchError::Inconsistent) => {
                    if self.resolve(db)? {
                        continue;
                    }
                    break SolverStatus::Exhausted;
                }
                Err(e) => return Err(e),
            };

            if self.config.max_depth > 0 && self.stack.len() >= self.config.max_depth {
                break SolverStatus::DepthLimit;
            }
            if self.config.max_steps > 0 && self.steps >= self.config.max_steps {
                break SolverStatus::StepLimit;
            }

            self.steps += 1;
            self.stack.push(point);
            if !self.resolve(db)? {
                break SolverStatus::Exhausted;
            }
        };

        let result = SolverResult {
            status,
            steps: self.steps,
            depth: self.stack.len(),
            backtracks: self.backtracks,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            status = ?result.status,
            steps = result.steps,
            depth = result.depth,
            backtracks = result.backtracks,
            elapsed_ms = result.elapsed_ms,
            "search finished"
        );
        Ok(result)
    }

    /// Retracts every open decision and clears the counters.
    pub fn reset(&mut self, db: &mut PlanDatabase) -> Result<(), SearchError> {
        while let Some(mut point) = self.stack.pop() {
            if point.is_committed() {
                point.retract(db)?;
            }
        }
        self.steps = 0;
        self.backtracks = 0;
        Ok(())
    }

    /// Brings the top of the stack to a committed choice that propagates.
    ///
    /// A committed top is treated as failed and moves to its next choice.
    /// Exhausted points are popped. Returns `false` once the stack is
    /// empty.
    fn resolve(&mut self, db: &mut PlanDatabase) -> Result<bool, SearchError> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                return Ok(false);
            };
            if top.is_committed() {
                top.retract(db)?;
                top.advance()?;
            }
            if try_choices(top, db)? {
                return Ok(true);
            }
            self.stack.pop();
            self.backtracks += 1;
        }
    }
}

/// Commits choices of `point` from the cursor on until one propagates.
fn try_choices(point: &mut DecisionPoint, db: &mut PlanDatabase) -> Result<bool, SearchError> {
    while !point.is_exhausted() {
        point.commit(db)?;
        if db.propagate() {
            return Ok(true);
        }
        point.retract(db)?;
        point.advance()?;
    }
    Ok(false)
}
