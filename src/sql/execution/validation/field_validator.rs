//! Column and Function Reference Validation
//!
//! Checks, before any row is read, that every column a query reads exists in
//! the source table and that every function call names a known function with
//! an acceptable number of arguments.

use crate::sql::ast::{Condition, Expr, SelectExpr};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::expression::function_registry::FunctionRegistry;
use crate::sql::execution::expression::functions::find_function;

/// Validator for column and function references
pub struct FieldValidator;

impl FieldValidator {
    /// Every column read by `expr` must be one of `available`.
    pub fn validate_columns(expr: &SelectExpr, available: &[String], clause: &str) -> SqlResult<()> {
        match expr {
            SelectExpr::Value(e) => Self::check_names(e.referenced_columns(), available, clause),
            SelectExpr::Condition(c) => Self::check_names(c.referenced_columns(), available, clause),
        }
    }

    pub fn validate_condition_columns(
        condition: &Condition,
        available: &[String],
        clause: &str,
    ) -> SqlResult<()> {
        Self::check_names(condition.referenced_columns(), available, clause)
    }

    fn check_names(names: Vec<&str>, available: &[String], clause: &str) -> SqlResult<()> {
        match names
            .into_iter()
            .find(|name| !available.iter().any(|a| a.eq_ignore_ascii_case(name)))
        {
            Some(missing) => Err(SqlError::validation_error(
                format!("Unknown column in {}", clause),
                Some(missing.to_string()),
            )),
            None => Ok(()),
        }
    }

    /// Every function call must resolve to a built-in or registered function
    /// accepting its argument count.
    pub fn validate_functions(expr: &SelectExpr, functions: &FunctionRegistry) -> SqlResult<()> {
        let mut calls: Vec<(String, usize)> = Vec::new();
        let mut collect = |e: &Expr| {
            if let Expr::Function { name, args } = e {
                calls.push((name.clone(), args.len()));
            }
        };
        match expr {
            SelectExpr::Value(e) => e.walk(&mut collect),
            SelectExpr::Condition(c) => c.walk(&mut collect),
        }
        for (name, arity) in calls {
            Self::check_call(&name, arity, functions)?;
        }
        Ok(())
    }

    fn check_call(name: &str, arity: usize, functions: &FunctionRegistry) -> SqlResult<()> {
        let accepted = match find_function(name) {
            Some(def) => def.accepts(arity),
            None if functions.contains(name) => functions.resolve(name, arity).is_some(),
            None => return Err(SqlError::unknown_function(name)),
        };
        if accepted {
            Ok(())
        } else {
            Err(SqlError::validation_error(
                format!(
                    "Function {} does not accept {} arguments",
                    name.to_uppercase(),
                    arity
                ),
                None,
            ))
        }
    }
}
