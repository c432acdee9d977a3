//! Invariant collection and the external evaluator seam.

pub mod collector;
#[cfg(feature = "process-evaluator")]
pub mod command;
pub mod evaluator;

pub use collector::{InvariantCollector, InvariantJob};
#[cfg(feature = "process-evaluator")]
pub use command::{CommandEvaluator, CommandEvaluatorConfig};
pub use evaluator::{EvaluationTrace, EvaluatorResponse, InvariantEvaluator, InvariantResult};
