//! Expression evaluation
//!
//! All data binding between steps (input mapping, response mapping, loop
//! selectors, final transforms) goes through this module, so its failure
//! contract defines the engine's failure boundary for user-authored
//! expressions: malformed expressions error, missing data does not.

mod evaluator;
mod parser;
mod schema;

pub use evaluator::{evaluate, evaluate_with_schema, EvalOutcome};
pub use parser::{parse, BinOp, Expr};
pub use schema::validate_schema;
