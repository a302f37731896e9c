//! # flatsql
//!
//! SQL query execution over delimited text files.
//!
//! Tables are CSV-like files (or in-memory rows) registered in a
//! [`TableCatalog`](datasource::TableCatalog). Queries arrive as already
//! parsed [`QueryDescriptor`](sql::QueryDescriptor)s and are executed by a
//! [`QueryEngine`](sql::QueryEngine), which hands back a
//! [`ResultCursor`](sql::ResultCursor) to step through the rows.
//!
//! ## Features
//!
//! - **Delimited and fixed-width files**: configurable separator, quote style,
//!   headers, comments, BOM and line-ending handling
//! - **Typed columns**: declared or inferred per-column types with
//!   configurable date/time formats
//! - **SELECT pipeline**: WHERE, DISTINCT, GROUP BY, HAVING, ORDER BY,
//!   LIMIT/OFFSET with SQL three-valued logic
//! - **Sub-queries**: scalar, EXISTS and IN, correlated with the outer row
//! - **Cursors**: forward-only or scrollable, cancellable, with timeouts
//!
//! ## Quick Start
//!
//! ```rust
//! use flatsql::datasource::{CsvSourceConfig, TableCatalog};
//! use flatsql::sql::ast::{AggregateFunction, Expr, OrderByExpr, QueryDescriptor, SelectItem};
//! use flatsql::sql::QueryEngine;
//!
//! let mut catalog = TableCatalog::new();
//! catalog
//!     .register_text(
//!         "sales",
//!         "region,amount\nnorth,10\nsouth,5\nnorth,7\n",
//!         CsvSourceConfig::default().with_column_types("String,Integer"),
//!     )
//!     .unwrap();
//!
//! let query = QueryDescriptor::new(vec![
//!     SelectItem::column("region"),
//!     SelectItem::aliased(Expr::aggregate(AggregateFunction::Sum, Expr::column("amount")), "total"),
//! ])
//! .from_table("sales")
//! .group_by(vec![Expr::column("region")])
//! .order_by(vec![OrderByExpr::desc(Expr::column("total"))]);
//!
//! let engine = QueryEngine::new(catalog);
//! let rows = engine.execute(&query).unwrap().fetch_all().unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[0][1].as_ref().map(|v| v.to_string()), Some("17".to_string()));
//! ```

#![allow(clippy::collapsible_if)]
#![allow(clippy::large_enum_variant)]

pub mod datasource;
pub mod sql;

// Re-export main API at crate root for easy access
pub use datasource::{CsvSourceConfig, MemoryTable, QuoteStyle, RowSource, TableCatalog};
pub use sql::{
    CancelHandle, ExecutionConfig, FieldValue, PreparedQuery, QueryDescriptor, QueryEngine,
    ResultCursor, SqlError, SqlResult,
};
