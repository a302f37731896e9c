//! Shared fixtures for the unit test tree

use flatsql::datasource::{CsvSourceConfig, TableCatalog};
use flatsql::sql::ast::QueryDescriptor;
use flatsql::sql::{FieldValue, QueryEngine, SqlResult};

pub const EMPLOYEES: &str = "\
id,name,dept,salary,hired
1,Ann,eng,120,2019-03-01
2,Bob,ops,80,2020-07-15
3,Cid,eng,100,2018-11-30
4,Dee,,95,2021-01-04
5,Eve,ops,,2022-05-20
";

pub const DEPARTMENTS: &str = "\
code,title
eng,Engineering
ops,Operations
";

/// `employees` (typed) and `depts` (all text)
pub fn catalog() -> TableCatalog {
    let mut catalog = TableCatalog::new();
    catalog
        .register_text(
            "employees",
            EMPLOYEES,
            CsvSourceConfig::default().with_column_types("Integer,String,String,Integer,Date"),
        )
        .expect("employees table");
    catalog
        .register_text("depts", DEPARTMENTS, CsvSourceConfig::default())
        .expect("depts table");
    catalog
}

pub fn engine() -> QueryEngine {
    QueryEngine::new(catalog())
}

pub fn render(value: &Option<FieldValue>) -> String {
    value
        .as_ref()
        .map_or_else(|| "NULL".to_string(), |v| v.to_string())
}

/// Execute and render every row as text, NULL as `NULL`
pub fn query_text(engine: &QueryEngine, query: &QueryDescriptor) -> SqlResult<Vec<Vec<String>>> {
    let rows = engine.execute(query)?.fetch_all()?;
    Ok(rows
        .iter()
        .map(|row| row.iter().map(render).collect())
        .collect())
}

/// First column of every row
pub fn column_text(engine: &QueryEngine, query: &QueryDescriptor) -> Vec<String> {
    query_text(engine, query)
        .expect("query runs")
        .into_iter()
        .map(|mut row| row.remove(0))
        .collect()
}
