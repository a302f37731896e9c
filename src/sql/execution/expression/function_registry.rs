//! User-defined functions.
//!
//! Callers register [`FunctionSignature`]s with fixed parameter types and an
//! optional variadic tail. Calls are resolved by name and argument count when
//! a query is prepared; at evaluation time every non-null argument is coerced
//! to its declared parameter type before the handler runs.

use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::expression::functions::find_function;
use crate::sql::execution::types::{DataType, FieldValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Function handler signature
pub type UserFunctionHandler =
    Arc<dyn Fn(&[Option<FieldValue>]) -> SqlResult<Option<FieldValue>> + Send + Sync>;

/// A typed user function.
#[derive(Clone)]
pub struct FunctionSignature {
    /// Upper-case function name
    pub name: String,
    /// Declared types of the fixed parameters
    pub params: Vec<DataType>,
    /// Type of any number of trailing arguments
    pub variadic: Option<DataType>,
    pub return_type: DataType,
    pub handler: UserFunctionHandler,
}

impl FunctionSignature {
    pub fn new<F>(name: &str, params: Vec<DataType>, return_type: DataType, handler: F) -> Self
    where
        F: Fn(&[Option<FieldValue>]) -> SqlResult<Option<FieldValue>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_uppercase(),
            params,
            variadic: None,
            return_type,
            handler: Arc::new(handler),
        }
    }

    /// Accept any number of extra arguments of `data_type` after the fixed ones
    pub fn with_variadic(mut self, data_type: DataType) -> Self {
        self.variadic = Some(data_type);
        self
    }

    pub fn accepts(&self, arity: usize) -> bool {
        match self.variadic {
            Some(_) => arity >= self.params.len(),
            None => arity == self.params.len(),
        }
    }

    fn param_type(&self, index: usize) -> Option<DataType> {
        self.params.get(index).copied().or(self.variadic)
    }

    /// Coerce arguments to the declared types and run the handler.
    pub fn invoke(
        &self,
        args: Vec<Option<FieldValue>>,
        converter: &TypeConverter,
    ) -> SqlResult<Option<FieldValue>> {
        let mut coerced = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let target = self.param_type(i).ok_or_else(|| {
                SqlError::execution_error(format!(
                    "Function {} does not accept {} arguments",
                    self.name,
                    i + 1
                ))
            })?;
            coerced.push(match arg {
                Some(value) => Some(converter.coerce(value, target)?),
                None => None,
            });
        }
        (self.handler)(&coerced)
    }
}

impl fmt::Debug for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSignature")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// Registry of user functions, keyed by upper-case name.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<FunctionSignature>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function. Built-in names and overloads that accept the same
    /// argument count as an existing one are rejected.
    pub fn register(&mut self, signature: FunctionSignature) -> SqlResult<()> {
        if find_function(&signature.name).is_some() {
            return Err(SqlError::configuration_error(format!(
                "Function {} is built in and cannot be redefined",
                signature.name
            )));
        }
        let overloads = self.functions.entry(signature.name.clone()).or_default();
        let clashes = overloads.iter().any(|existing| {
            let (a, b) = (existing.params.len(), signature.params.len());
            existing.accepts(b) || signature.accepts(a)
        });
        if clashes {
            return Err(SqlError::configuration_error(format!(
                "Function {} already has an overload for {} arguments",
                signature.name,
                signature.params.len()
            )));
        }
        log::debug!(
            "Registered function {} with {} parameters",
            signature.name,
            signature.params.len()
        );
        overloads.push(signature);
        Ok(())
    }

    /// Find the overload accepting `arity` arguments
    pub fn resolve(&self, name: &str, arity: usize) -> Option<&FunctionSignature> {
        self.functions
            .get(&name.to_uppercase())?
            .iter()
            .find(|sig| sig.accepts(arity))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
