/*!
# Query Descriptor

Syntax tree types consumed by the execution core. A [`QueryDescriptor`] is
produced by an external SQL parser (or built directly with the helper
constructors below) and is treated as read-only by the engine.

Value expressions ([`Expr`]) and logical expressions ([`Condition`]) are
separate types: arithmetic only accepts value operands, and AND/OR/NOT only
accept logical operands, so `(A > 5) + 1` cannot be built in the first place.
A condition used as a select-list item goes through [`SelectExpr::Condition`].
*/

use crate::sql::execution::types::FieldValue;
use std::fmt;

/// A single-table SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDescriptor {
    /// Ordered select list
    pub select: Vec<SelectItem>,
    /// SELECT DISTINCT
    pub distinct: bool,
    /// Source table; `None` evaluates the select list once over an empty row
    pub from: Option<TableReference>,
    /// WHERE condition
    pub where_clause: Option<Condition>,
    /// GROUP BY expressions (empty when absent)
    pub group_by: Vec<Expr>,
    /// HAVING condition
    pub having: Option<Condition>,
    /// ORDER BY list (empty when absent)
    pub order_by: Vec<OrderByExpr>,
    /// LIMIT; `None` is unbounded
    pub limit: Option<u64>,
    /// OFFSET
    pub offset: u64,
    /// Number of `?` placeholders in the statement
    pub placeholder_count: usize,
}

impl QueryDescriptor {
    pub fn new(select: Vec<SelectItem>) -> Self {
        Self {
            select,
            ..Default::default()
        }
    }

    pub fn from_table(mut self, name: impl Into<String>) -> Self {
        self.from = Some(TableReference::new(name));
        self
    }

    pub fn from_aliased(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.from = Some(TableReference::new(name).with_alias(alias));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_where(mut self, condition: Condition) -> Self {
        self.where_clause = Some(condition);
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderByExpr>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn placeholders(mut self, count: usize) -> Self {
        self.placeholder_count = count;
        self
    }

    /// Sub-queries nested directly in this query's clauses. Queries nested
    /// inside those are not included.
    pub fn subqueries<'a>(&'a self) -> Vec<(&'a QueryDescriptor, SubqueryKind)> {
        let mut out = Vec::new();
        let mut push = |query: &'a QueryDescriptor, kind: SubqueryKind| out.push((query, kind));
        for item in &self.select {
            match item {
                SelectItem::Expression {
                    expr: SelectExpr::Value(e),
                    ..
                } => e.visit_subqueries(&mut push),
                SelectItem::Expression {
                    expr: SelectExpr::Condition(c),
                    ..
                } => c.visit_subqueries(&mut push),
                SelectItem::Wildcard | SelectItem::QualifiedWildcard(_) => {}
            }
        }
        if let Some(c) = &self.where_clause {
            c.visit_subqueries(&mut push);
        }
        for e in &self.group_by {
            e.visit_subqueries(&mut push);
        }
        if let Some(c) = &self.having {
            c.visit_subqueries(&mut push);
        }
        for o in &self.order_by {
            o.expr.visit_subqueries(&mut push);
        }
        out
    }
}

/// How a nested query's result is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Scalar,
    Exists,
    In,
}

impl SubqueryKind {
    /// Label used in errors when the result must be a single column.
    pub fn single_column(self) -> Option<&'static str> {
        match self {
            SubqueryKind::Scalar => Some("Scalar"),
            SubqueryKind::In => Some("IN"),
            SubqueryKind::Exists => None,
        }
    }
}

/// Table named in FROM.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReference {
    pub name: String,
    pub alias: Option<String>,
}

impl TableReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `alias.*`
    QualifiedWildcard(String),
    /// `expr [AS alias]`
    Expression {
        expr: SelectExpr,
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::Expression {
            expr: SelectExpr::Value(Expr::Column(name.into())),
            alias: None,
        }
    }

    pub fn expr(expr: impl Into<SelectExpr>) -> Self {
        SelectItem::Expression {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn aliased(expr: impl Into<SelectExpr>, alias: impl Into<String>) -> Self {
        SelectItem::Expression {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }
}

/// A select-list expression: either a value or a logical expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    Value(Expr),
    Condition(Condition),
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::Value(expr)
    }
}

impl From<Condition> for SelectExpr {
    fn from(condition: Condition) -> Self {
        SelectExpr::Condition(condition)
    }
}

impl fmt::Display for SelectExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectExpr::Value(e) => write!(f, "{}", e),
            SelectExpr::Condition(c) => write!(f, "{}", c),
        }
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
        }
    }
}

/// Arithmetic and concatenation operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// `||`
    Concat,
}

impl ArithmeticOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulo => "%",
            ArithmeticOperator::Concat => "||",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThanOrEqual => ">=",
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StringAgg,
    ArrayAgg,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::StringAgg => "STRING_AGG",
            AggregateFunction::ArrayAgg => "ARRAY_AGG",
        }
    }
}

/// One aggregate call-site.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub distinct: bool,
    /// Argument; `None` only for `COUNT(*)`
    pub argument: Option<Box<Expr>>,
    /// Fixed delimiter for STRING_AGG
    pub delimiter: Option<String>,
}

/// Value expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally qualified as `TABLE.COLUMN`
    Column(String),
    /// Literal value; `None` is NULL
    Literal(Option<FieldValue>),
    /// One-based `?` placeholder
    Placeholder(usize),
    /// Unary minus
    Negate(Box<Expr>),
    /// Arithmetic or concatenation
    BinaryOp {
        left: Box<Expr>,
        op: ArithmeticOperator,
        right: Box<Expr>,
    },
    /// Scalar or user function call
    Function { name: String, args: Vec<Expr> },
    /// Aggregate function call
    Aggregate(AggregateCall),
    /// `CASE WHEN cond THEN value ... ELSE value END`
    SearchedCase {
        when_clauses: Vec<(Condition, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    /// `CASE operand WHEN value THEN value ... ELSE value END`
    SimpleCase {
        operand: Box<Expr>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    /// Scalar sub-query
    Subquery(Box<QueryDescriptor>),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn literal(value: FieldValue) -> Self {
        Expr::Literal(Some(value))
    }

    pub fn null() -> Self {
        Expr::Literal(None)
    }

    pub fn int(value: i32) -> Self {
        Expr::Literal(Some(FieldValue::Integer(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Some(FieldValue::String(value.into())))
    }

    pub fn binary(left: Expr, op: ArithmeticOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn count_star() -> Self {
        Expr::Aggregate(AggregateCall {
            function: AggregateFunction::Count,
            distinct: false,
            argument: None,
            delimiter: None,
        })
    }

    pub fn aggregate(function: AggregateFunction, argument: Expr) -> Self {
        Expr::Aggregate(AggregateCall {
            function,
            distinct: false,
            argument: Some(Box::new(argument)),
            delimiter: None,
        })
    }

    pub fn aggregate_distinct(function: AggregateFunction, argument: Expr) -> Self {
        Expr::Aggregate(AggregateCall {
            function,
            distinct: true,
            argument: Some(Box::new(argument)),
            delimiter: None,
        })
    }

    pub fn string_agg(argument: Expr, delimiter: impl Into<String>, distinct: bool) -> Self {
        Expr::Aggregate(AggregateCall {
            function: AggregateFunction::StringAgg,
            distinct,
            argument: Some(Box::new(argument)),
            delimiter: Some(delimiter.into()),
        })
    }

    pub fn subquery(query: QueryDescriptor) -> Self {
        Expr::Subquery(Box::new(query))
    }

    /// Column names read by this expression, outside of sub-queries.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit_columns(&mut |name| out.push(name));
        out
    }

    /// Columns among `available` that this expression reads.
    pub fn used_columns(&self, available: &[String]) -> Vec<String> {
        used_among(self.referenced_columns(), available)
    }

    /// Aggregate calls nested in this expression, outside of sub-queries.
    pub fn aggregate_functions(&self) -> Vec<&AggregateCall> {
        let mut out = Vec::new();
        self.collect_aggregates(&mut out);
        out
    }

    pub fn contains_aggregate(&self) -> bool {
        !self.aggregate_functions().is_empty()
    }

    pub(crate) fn visit_columns<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Expr::Column(name) => f(name),
            Expr::Literal(_) | Expr::Placeholder(_) | Expr::Subquery(_) => {}
            Expr::Negate(e) => e.visit_columns(f),
            Expr::BinaryOp { left, right, .. } => {
                left.visit_columns(f);
                right.visit_columns(f);
            }
            Expr::Function { args, .. } => args.iter().for_each(|a| a.visit_columns(f)),
            Expr::Aggregate(call) => {
                if let Some(arg) = &call.argument {
                    arg.visit_columns(f);
                }
            }
            Expr::SearchedCase {
                when_clauses,
                else_clause,
            } => {
                for (cond, value) in when_clauses {
                    cond.visit_columns(f);
                    value.visit_columns(f);
                }
                if let Some(e) = else_clause {
                    e.visit_columns(f);
                }
            }
            Expr::SimpleCase {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand.visit_columns(f);
                for (when, value) in when_clauses {
                    when.visit_columns(f);
                    value.visit_columns(f);
                }
                if let Some(e) = else_clause {
                    e.visit_columns(f);
                }
            }
        }
    }

    pub(crate) fn collect_aggregates<'a>(&'a self, out: &mut Vec<&'a AggregateCall>) {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Placeholder(_) | Expr::Subquery(_) => {}
            Expr::Negate(e) => e.collect_aggregates(out),
            Expr::BinaryOp { left, right, .. } => {
                left.collect_aggregates(out);
                right.collect_aggregates(out);
            }
            Expr::Function { args, .. } => args.iter().for_each(|a| a.collect_aggregates(out)),
            Expr::Aggregate(call) => out.push(call),
            Expr::SearchedCase {
                when_clauses,
                else_clause,
            } => {
                for (cond, value) in when_clauses {
                    cond.collect_aggregates(out);
                    value.collect_aggregates(out);
                }
                if let Some(e) = else_clause {
                    e.collect_aggregates(out);
                }
            }
            Expr::SimpleCase {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand.collect_aggregates(out);
                for (when, value) in when_clauses {
                    when.collect_aggregates(out);
                    value.collect_aggregates(out);
                }
                if let Some(e) = else_clause {
                    e.collect_aggregates(out);
                }
            }
        }
    }

    pub(crate) fn value_children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Placeholder(_) | Expr::Subquery(_) => {
                Vec::new()
            }
            Expr::Negate(e) => vec![e.as_ref()],
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::Aggregate(call) => call.argument.iter().map(|a| a.as_ref()).collect(),
            Expr::SearchedCase {
                when_clauses,
                else_clause,
            } => when_clauses
                .iter()
                .map(|(_, value)| value)
                .chain(else_clause.as_deref())
                .collect(),
            Expr::SimpleCase {
                operand,
                when_clauses,
                else_clause,
            } => std::iter::once(operand.as_ref())
                .chain(when_clauses.iter().flat_map(|(when, value)| [when, value]))
                .chain(else_clause.as_deref())
                .collect(),
        }
    }

    pub(crate) fn condition_children(&self) -> Vec<&Condition> {
        match self {
            Expr::SearchedCase { when_clauses, .. } => {
                when_clauses.iter().map(|(cond, _)| cond).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Visit this expression and every value expression nested in it,
    /// conditions included, outside of sub-queries.
    pub(crate) fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.value_children() {
            child.walk(f);
        }
        for cond in self.condition_children() {
            cond.walk(f);
        }
    }

    pub(crate) fn visit_subqueries<'a>(
        &'a self,
        f: &mut dyn FnMut(&'a QueryDescriptor, SubqueryKind),
    ) {
        if let Expr::Subquery(query) = self {
            f(query, SubqueryKind::Scalar);
        }
        for child in self.value_children() {
            child.visit_subqueries(f);
        }
        for cond in self.condition_children() {
            cond.visit_subqueries(f);
        }
    }

    /// Copy of this expression with column references replaced wherever
    /// `replace` returns a substitute.
    pub(crate) fn map_columns(&self, replace: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        let map = |e: &Expr| e.map_columns(replace);
        let map_box = |e: &Expr| Box::new(e.map_columns(replace));
        match self {
            Expr::Column(name) => replace(name).unwrap_or_else(|| self.clone()),
            Expr::Literal(_) | Expr::Placeholder(_) | Expr::Subquery(_) => self.clone(),
            Expr::Negate(e) => Expr::Negate(map_box(e)),
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: map_box(left),
                op: *op,
                right: map_box(right),
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(map).collect(),
            },
            Expr::Aggregate(call) => Expr::Aggregate(AggregateCall {
                argument: call.argument.as_deref().map(map_box),
                ..call.clone()
            }),
            Expr::SearchedCase {
                when_clauses,
                else_clause,
            } => Expr::SearchedCase {
                when_clauses: when_clauses
                    .iter()
                    .map(|(cond, value)| (cond.map_columns(replace), map(value)))
                    .collect(),
                else_clause: else_clause.as_deref().map(map_box),
            },
            Expr::SimpleCase {
                operand,
                when_clauses,
                else_clause,
            } => Expr::SimpleCase {
                operand: map_box(operand),
                when_clauses: when_clauses
                    .iter()
                    .map(|(when, value)| (map(when), map(value)))
                    .collect(),
                else_clause: else_clause.as_deref().map(map_box),
            },
        }
    }
}

/// Logical expressions, evaluated with three-valued truth
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Expr,
        op: ComparisonOperator,
        right: Expr,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    InList {
        expr: Expr,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Expr,
        query: Box<QueryDescriptor>,
        negated: bool,
    },
    Exists {
        query: Box<QueryDescriptor>,
        negated: bool,
    },
    Like {
        expr: Expr,
        pattern: Expr,
        escape: char,
        negated: bool,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    /// A boolean-valued expression used as a condition
    Truth(Expr),
}

impl Condition {
    pub fn compare(left: Expr, op: ComparisonOperator, right: Expr) -> Self {
        Condition::Comparison { left, op, right }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::compare(left, ComparisonOperator::Equal, right)
    }

    pub fn and(left: Condition, right: Condition) -> Self {
        Condition::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Condition::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    pub fn between(expr: Expr, low: Expr, high: Expr) -> Self {
        Condition::Between {
            expr,
            low,
            high,
            negated: false,
        }
    }

    pub fn in_list(expr: Expr, list: Vec<Expr>) -> Self {
        Condition::InList {
            expr,
            list,
            negated: false,
        }
    }

    pub fn like(expr: Expr, pattern: impl Into<String>) -> Self {
        Condition::Like {
            expr,
            pattern: Expr::string(pattern),
            escape: '\\',
            negated: false,
        }
    }

    pub fn is_null(expr: Expr) -> Self {
        Condition::IsNull {
            expr,
            negated: false,
        }
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Condition::IsNull {
            expr,
            negated: true,
        }
    }

    pub fn exists(query: QueryDescriptor) -> Self {
        Condition::Exists {
            query: Box::new(query),
            negated: false,
        }
    }

    pub fn in_subquery(expr: Expr, query: QueryDescriptor) -> Self {
        Condition::InSubquery {
            expr,
            query: Box::new(query),
            negated: false,
        }
    }

    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit_columns(&mut |name| out.push(name));
        out
    }

    /// Columns among `available` that this condition reads.
    pub fn used_columns(&self, available: &[String]) -> Vec<String> {
        used_among(self.referenced_columns(), available)
    }

    pub fn aggregate_functions(&self) -> Vec<&AggregateCall> {
        let mut out = Vec::new();
        self.collect_aggregates(&mut out);
        out
    }

    pub fn contains_aggregate(&self) -> bool {
        !self.aggregate_functions().is_empty()
    }

    pub(crate) fn value_children(&self) -> Vec<&Expr> {
        match self {
            Condition::Comparison { left, right, .. } => vec![left, right],
            Condition::And(..) | Condition::Or(..) | Condition::Not(_) => Vec::new(),
            Condition::Between { expr, low, high, .. } => vec![expr, low, high],
            Condition::InList { expr, list, .. } => {
                let mut v = vec![expr];
                v.extend(list.iter());
                v
            }
            Condition::InSubquery { expr, .. } => vec![expr],
            Condition::Exists { .. } => Vec::new(),
            Condition::Like { expr, pattern, .. } => vec![expr, pattern],
            Condition::IsNull { expr, .. } => vec![expr],
            Condition::Truth(expr) => vec![expr],
        }
    }

    pub(crate) fn condition_children(&self) -> Vec<&Condition> {
        match self {
            Condition::And(l, r) | Condition::Or(l, r) => vec![l, r],
            Condition::Not(c) => vec![c],
            _ => Vec::new(),
        }
    }

    pub(crate) fn visit_columns<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        for e in self.value_children() {
            e.visit_columns(f);
        }
        for c in self.condition_children() {
            c.visit_columns(f);
        }
    }

    pub(crate) fn collect_aggregates<'a>(&'a self, out: &mut Vec<&'a AggregateCall>) {
        for e in self.value_children() {
            e.collect_aggregates(out);
        }
        for c in self.condition_children() {
            c.collect_aggregates(out);
        }
    }

    /// Visit every value expression nested in this condition, outside of
    /// sub-queries.
    pub(crate) fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        for e in self.value_children() {
            e.walk(f);
        }
        for c in self.condition_children() {
            c.walk(f);
        }
    }

    pub(crate) fn visit_subqueries<'a>(
        &'a self,
        f: &mut dyn FnMut(&'a QueryDescriptor, SubqueryKind),
    ) {
        match self {
            Condition::InSubquery { query, .. } => f(query, SubqueryKind::In),
            Condition::Exists { query, .. } => f(query, SubqueryKind::Exists),
            _ => {}
        }
        for e in self.value_children() {
            e.visit_subqueries(f);
        }
        for c in self.condition_children() {
            c.visit_subqueries(f);
        }
    }

    /// Copy of this condition with column references replaced wherever
    /// `replace` returns a substitute.
    pub(crate) fn map_columns(&self, replace: &dyn Fn(&str) -> Option<Expr>) -> Condition {
        let map = |e: &Expr| e.map_columns(replace);
        let map_box = |c: &Condition| Box::new(c.map_columns(replace));
        match self {
            Condition::Comparison { left, op, right } => Condition::Comparison {
                left: map(left),
                op: *op,
                right: map(right),
            },
            Condition::And(l, r) => Condition::And(map_box(l), map_box(r)),
            Condition::Or(l, r) => Condition::Or(map_box(l), map_box(r)),
            Condition::Not(c) => Condition::Not(map_box(c)),
            Condition::Between {
                expr,
                low,
                high,
                negated,
            } => Condition::Between {
                expr: map(expr),
                low: map(low),
                high: map(high),
                negated: *negated,
            },
            Condition::InList {
                expr,
                list,
                negated,
            } => Condition::InList {
                expr: map(expr),
                list: list.iter().map(map).collect(),
                negated: *negated,
            },
            Condition::InSubquery {
                expr,
                query,
                negated,
            } => Condition::InSubquery {
                expr: map(expr),
                query: query.clone(),
                negated: *negated,
            },
            Condition::Exists { .. } => self.clone(),
            Condition::Like {
                expr,
                pattern,
                escape,
                negated,
            } => Condition::Like {
                expr: map(expr),
                pattern: map(pattern),
                escape: *escape,
                negated: *negated,
            },
            Condition::IsNull { expr, negated } => Condition::IsNull {
                expr: map(expr),
                negated: *negated,
            },
            Condition::Truth(e) => Condition::Truth(map(e)),
        }
    }
}

fn used_among(referenced: Vec<&str>, available: &[String]) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    for name in referenced {
        if let Some(col) = available.iter().find(|a| a.eq_ignore_ascii_case(name)) {
            if !used.iter().any(|u| u.eq_ignore_ascii_case(col)) {
                used.push(col.clone());
            }
        }
    }
    used
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(None) => write!(f, "NULL"),
            Expr::Literal(Some(FieldValue::String(s))) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(Some(v)) => write!(f, "{}", v),
            Expr::Placeholder(_) => write!(f, "?"),
            Expr::Negate(e) => write!(f, "-{}", e),
            Expr::BinaryOp { left, op, right } => write!(f, "{}{}{}", left, op.symbol(), right),
            Expr::Function { name, args } => {
                write!(f, "{}(", name.to_uppercase())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Aggregate(call) => {
                write!(f, "{}(", call.function.name())?;
                if call.distinct {
                    write!(f, "DISTINCT ")?;
                }
                match &call.argument {
                    Some(arg) => write!(f, "{}", arg)?,
                    None => write!(f, "*")?,
                }
                if let Some(d) = &call.delimiter {
                    write!(f, ", '{}'", d)?;
                }
                write!(f, ")")
            }
            Expr::SearchedCase { .. } | Expr::SimpleCase { .. } => write!(f, "CASE"),
            Expr::Subquery(_) => write!(f, "(SELECT)"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |negated: &bool| if *negated { "NOT " } else { "" };
        match self {
            Condition::Comparison { left, op, right } => {
                write!(f, "{}{}{}", left, op.symbol(), right)
            }
            Condition::And(l, r) => write!(f, "{} AND {}", l, r),
            Condition::Or(l, r) => write!(f, "{} OR {}", l, r),
            Condition::Not(c) => write!(f, "NOT {}", c),
            Condition::Between {
                expr,
                low,
                high,
                negated,
            } => write!(f, "{} {}BETWEEN {} AND {}", expr, not(negated), low, high),
            Condition::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", expr, not(negated))?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Condition::InSubquery { expr, negated, .. } => {
                write!(f, "{} {}IN (SELECT)", expr, not(negated))
            }
            Condition::Exists { negated, .. } => write!(f, "{}EXISTS (SELECT)", not(negated)),
            Condition::Like {
                expr,
                pattern,
                negated,
                ..
            } => write!(f, "{} {}LIKE {}", expr, not(negated), pattern),
            Condition::IsNull { expr, negated } => write!(f, "{} IS {}NULL", expr, not(negated)),
            Condition::Truth(e) => write!(f, "{}", e),
        }
    }
}
