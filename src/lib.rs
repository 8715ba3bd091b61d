//! Constraint-based plan synthesis core.
//!
//! Two layers over one constraint network:
//!
//! - **Propagation** ([`network`]): typed variables with base, specified,
//!   and derived domains; narrowing rules scheduled through per-kind
//!   agendas to a fixpoint; inconsistency detected as an emptied domain;
//!   every change published as a plan event.
//! - **Search** ([`flaws`], [`heuristics`], [`search`]): flaws (undecided
//!   variables, open conditions, threats) are tracked incrementally from
//!   plan events, scored by heuristic rules, and resolved through
//!   reversible decision points by a chronological backtracking solver.
//!
//! The [`plan`] module is a reference plan database: tokens on timelines
//! and resources, with the query surface and mutation hooks the search
//! layer drives.
//!
//! # Example
//!
//! ```
//! use u_plansearch::domain::Domain;
//! use u_plansearch::heuristics::{HeuristicsConfig, HeuristicsEngine};
//! use u_plansearch::plan::{NewToken, PlanDatabase, SimpleSchema};
//! use u_plansearch::search::{DecisionConfig, DecisionManager, Solver, SolverConfig};
//!
//! let mut schema = SimpleSchema::new();
//! schema.add_type("Rover", None).add_predicate("Drive", None, &[]);
//! let mut db = PlanDatabase::new(schema).with_horizon(0.0, 100.0);
//! db.create_timeline("rover1", "Rover");
//! db.create_token(
//!     NewToken::new("Drive")
//!         .with_object_type("Rover")
//!         .with_duration(Domain::int_interval(5.0, 5.0)),
//! )
//! .unwrap();
//!
//! let heuristics = HeuristicsEngine::new(HeuristicsConfig::default()).unwrap();
//! let manager = DecisionManager::new(&mut db, heuristics, DecisionConfig::default()).unwrap();
//! let result = Solver::new(SolverConfig::default(), manager).run(&mut db).unwrap();
//! assert!(result.is_solved());
//! ```

pub mod arena;
pub mod domain;
pub mod error;
pub mod flaws;
pub mod heuristics;
pub mod network;
pub mod plan;
pub mod search;

pub use domain::{Domain, Value};
pub use error::{ConfigError, DomainError, EngineError, HeuristicError, PlanError, SearchError};
pub use network::ConstraintEngine;
pub use plan::PlanDatabase;
pub use search::{DecisionManager, Solver, SolverResult, SolverStatus};
