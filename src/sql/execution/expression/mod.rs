//! Expression evaluation.
//!
//! This module contains all the logic for evaluating SQL expressions including:
//! - Expression evaluation (three-valued conditions and value expressions)
//! - Built-in scalar functions (math, string, conditional, date functions)
//! - User functions registered with typed signatures
//! - LIKE pattern compilation and caching
//! - The hook through which nested queries are executed

pub mod evaluator;
pub mod function_registry;
pub mod functions;
pub mod like;
pub mod subquery_executor;

// Re-export the main API
pub use evaluator::ExpressionEvaluator;
pub use function_registry::{FunctionRegistry, FunctionSignature};
pub use functions::{find_function, FunctionCategory, SqlFunctionDef};
pub use subquery_executor::SubqueryExecutor;
