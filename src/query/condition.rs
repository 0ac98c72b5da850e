//! Declarative conditions over flat records

use crate::data::{RowData, Value};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::GtEq => ">=",
            CompareOp::LtEq => "<=",
        };
        f.write_str(symbol)
    }
}

/// A single filter condition
#[derive(Debug, Clone)]
pub enum Condition {
    /// Compare a column's value against a constant
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// Case-insensitive substring match on a text column
    Like { column: String, pattern: String },
    /// Set membership
    In { column: String, values: Vec<Value> },
    /// Negated set membership
    NotIn { column: String, values: Vec<Value> },
}

impl Condition {
    /// Whether a row satisfies this condition. A missing column never
    /// matches.
    ///
    /// Equality and membership use structural equality; ordering operators
    /// use the index comparator, so mixed-type operands compare `Equal` and
    /// `>=`/`<=` hold across them. Callers must not rely on meaningful
    /// ordering between mixed types.
    pub fn matches(&self, row: &RowData) -> bool {
        match self {
            Condition::Compare { column, op, value } => {
                let Some(actual) = row.get(column) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => actual == value,
                    CompareOp::NotEq => actual != value,
                    CompareOp::Gt => actual.cmp_key(value) == Ordering::Greater,
                    CompareOp::Lt => actual.cmp_key(value) == Ordering::Less,
                    CompareOp::GtEq => actual.cmp_key(value) != Ordering::Less,
                    CompareOp::LtEq => actual.cmp_key(value) != Ordering::Greater,
                }
            }
            Condition::Like { column, pattern } => {
                let Some(Value::Text(text)) = row.get(column) else {
                    return false;
                };
                text.to_lowercase().contains(&pattern.to_lowercase())
            }
            Condition::In { column, values } => {
                let Some(actual) = row.get(column) else {
                    return false;
                };
                values.iter().any(|v| v == actual)
            }
            Condition::NotIn { column, values } => {
                let Some(actual) = row.get(column) else {
                    return false;
                };
                values.iter().all(|v| v != actual)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { column, op, value } => write!(f, "{column} {op} {value}"),
            Condition::Like { column, pattern } => write!(f, "{column} LIKE {pattern}"),
            Condition::In { column, values } => write!(f, "{column} IN {}", render_set(values)),
            Condition::NotIn { column, values } => {
                write!(f, "{column} NOT IN {}", render_set(values))
            }
        }
    }
}

fn render_set(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("({})", items.join(", "))
}

/// A declarative query shape: projection, AND-ed conditions, ordering,
/// limit/offset. Evaluation applies the conditions to one flat record.
#[derive(Debug, Clone)]
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    /// Set the projected columns
    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a comparison condition
    pub fn filter(mut self, column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        self.conditions.push(Condition::Compare {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// Add a LIKE condition
    pub fn like(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.conditions.push(Condition::Like {
            column: column.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// Add an IN condition
    pub fn within(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In {
            column: column.into(),
            values,
        });
        self
    }

    /// Add a NOT IN condition
    pub fn excluding(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::NotIn {
            column: column.into(),
            values,
        });
        self
    }

    pub fn order_by_asc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(format!("{} ASC", column.into()));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(format!("{} DESC", column.into()));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a row satisfies every condition (AND semantics)
    pub fn evaluate(&self, row: &RowData) -> bool {
        self.conditions.iter().all(|cond| cond.matches(row))
    }
}

/// Renders the query as a human-readable SQL-like statement
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM {}", self.columns.join(", "), self.table)?;

        if !self.conditions.is_empty() {
            let rendered: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
            write!(f, " WHERE {}", rendered.join(" AND "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", self.order_by.join(", "))?;
        }
        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        Ok(())
    }
}
