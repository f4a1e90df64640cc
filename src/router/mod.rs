//! Heuristic routing of tasks onto candidate models.

pub mod heuristic;
pub mod types;

pub use heuristic::{CandidateVerdict, HeuristicRouter, RouteOutcome, RoutingDecision};
pub use types::{CandidateModel, Constraints, RouterInputs, TaskType};
