//! Composable WHERE-clause builder.
//!
//! Columns are `&'static str` so only identifiers known at compile time
//! reach the SQL text; every value goes through a bind parameter.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Day,
    Month,
    Year,
}

impl DatePart {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }
}

/// Relations reachable from the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Posts,
}

impl Relation {
    fn subquery_head(self) -> &'static str {
        match self {
            Self::Posts => "(SELECT COUNT(*) FROM posts WHERE posts.user_id = users.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boolean {
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Condition {
    Compare {
        column: &'static str,
        op: Operator,
        value: Value,
    },
    In {
        column: &'static str,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: &'static str,
        low: Value,
        high: Value,
    },
    Date {
        column: &'static str,
        date: NaiveDate,
    },
    DatePart {
        column: &'static str,
        part: DatePart,
        value: i32,
    },
    Null {
        column: &'static str,
        negated: bool,
    },
    Nested(Filter),
    Has {
        relation: Relation,
        op: Operator,
        count: i64,
        constraint: Option<Filter>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(Boolean, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn push(mut self, boolean: Boolean, condition: Condition) -> Self {
        self.clauses.push((boolean, condition));
        self
    }

    pub fn where_cmp(self, column: &'static str, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.push(Boolean::And, Condition::Compare { column, op, value })
    }

    pub fn or_where_cmp(self, column: &'static str, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.push(Boolean::Or, Condition::Compare { column, op, value })
    }

    pub fn where_eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.where_cmp(column, Operator::Eq, value)
    }

    pub fn or_where_eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.or_where_cmp(column, Operator::Eq, value)
    }

    pub fn where_like(self, column: &'static str, pattern: impl Into<Value>) -> Self {
        self.where_cmp(column, Operator::Like, pattern)
    }

    pub fn or_where_like(self, column: &'static str, pattern: impl Into<Value>) -> Self {
        self.or_where_cmp(column, Operator::Like, pattern)
    }

    pub fn where_in<V: Into<Value>>(
        self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(
            Boolean::And,
            Condition::In {
                column,
                values,
                negated: false,
            },
        )
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(
            Boolean::And,
            Condition::In {
                column,
                values,
                negated: true,
            },
        )
    }

    pub fn where_between(
        self,
        column: &'static str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let (low, high) = (low.into(), high.into());
        self.push(Boolean::And, Condition::Between { column, low, high })
    }

    pub fn where_date(self, column: &'static str, date: NaiveDate) -> Self {
        self.push(Boolean::And, Condition::Date { column, date })
    }

    pub fn where_day(self, column: &'static str, day: i32) -> Self {
        self.where_part(column, DatePart::Day, day)
    }

    pub fn where_month(self, column: &'static str, month: i32) -> Self {
        self.where_part(column, DatePart::Month, month)
    }

    pub fn where_year(self, column: &'static str, year: i32) -> Self {
        self.where_part(column, DatePart::Year, year)
    }

    fn where_part(self, column: &'static str, part: DatePart, value: i32) -> Self {
        self.push(
            Boolean::And,
            Condition::DatePart {
                column,
                part,
                value,
            },
        )
    }

    pub fn where_null(self, column: &'static str) -> Self {
        self.push(
            Boolean::And,
            Condition::Null {
                column,
                negated: false,
            },
        )
    }

    pub fn where_not_null(self, column: &'static str) -> Self {
        self.push(
            Boolean::And,
            Condition::Null {
                column,
                negated: true,
            },
        )
    }

    /// `AND (...)`; an empty group adds nothing.
    pub fn where_group(self, group: impl FnOnce(Filter) -> Filter) -> Self {
        self.group(Boolean::And, group)
    }

    pub fn or_where_group(self, group: impl FnOnce(Filter) -> Filter) -> Self {
        self.group(Boolean::Or, group)
    }

    fn group(self, boolean: Boolean, group: impl FnOnce(Filter) -> Filter) -> Self {
        let inner = group(Filter::new());
        if inner.is_empty() {
            return self;
        }
        self.push(boolean, Condition::Nested(inner))
    }

    /// Rows with at least one related record.
    pub fn has(self, relation: Relation) -> Self {
        self.has_count(relation, Operator::Gte, 1)
    }

    pub fn has_count(self, relation: Relation, op: Operator, count: i64) -> Self {
        self.push(
            Boolean::And,
            Condition::Has {
                relation,
                op,
                count,
                constraint: None,
            },
        )
    }

    /// Rows with at least one related record matching `constraint`.
    pub fn where_has(self, relation: Relation, constraint: impl FnOnce(Filter) -> Filter) -> Self {
        let constraint = Some(constraint(Filter::new())).filter(|f| !f.is_empty());
        self.push(
            Boolean::And,
            Condition::Has {
                relation,
                op: Operator::Gte,
                count: 1,
                constraint,
            },
        )
    }

    /// Appends ` WHERE <conditions>` when the filter is non-empty.
    pub fn push_where<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        if self.is_empty() {
            return;
        }
        qb.push(" WHERE ");
        self.push_conditions(qb);
    }

    fn push_conditions<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        for (index, (boolean, condition)) in self.clauses.iter().enumerate() {
            if index > 0 {
                qb.push(match boolean {
                    Boolean::And => " AND ",
                    Boolean::Or => " OR ",
                });
            }
            push_condition(qb, condition);
        }
    }
}

fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &Condition) {
    match condition {
        Condition::Compare { column, op, value } => {
            qb.push(*column).push(" ").push(op.as_sql()).push(" ");
            push_value(qb, value);
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                qb.push(if *negated { "TRUE" } else { "FALSE" });
                return;
            }
            qb.push(*column)
                .push(if *negated { " NOT IN (" } else { " IN (" });
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        Condition::Between { column, low, high } => {
            qb.push(*column).push(" BETWEEN ");
            push_value(qb, low);
            qb.push(" AND ");
            push_value(qb, high);
        }
        Condition::Date { column, date } => {
            qb.push(*column).push("::date = ").push_bind(*date);
        }
        Condition::DatePart {
            column,
            part,
            value,
        } => {
            qb.push("EXTRACT(")
                .push(part.as_sql())
                .push(" FROM ")
                .push(*column)
                .push(") = ")
                .push_bind(*value);
        }
        Condition::Null { column, negated } => {
            qb.push(*column)
                .push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Condition::Nested(inner) => {
            qb.push("(");
            inner.push_conditions(qb);
            qb.push(")");
        }
        Condition::Has {
            relation,
            op,
            count,
            constraint,
        } => {
            qb.push(relation.subquery_head());
            if let Some(constraint) = constraint {
                qb.push(" AND (");
                constraint.push_conditions(qb);
                qb.push(")");
            }
            qb.push(") ")
                .push(op.as_sql())
                .push(" ")
                .push_bind(*count);
        }
    }
}

fn push_value<'args>(qb: &mut QueryBuilder<'args, Postgres>, value: &Value) {
    match value {
        Value::Text(text) => qb.push_bind(text.clone()),
        Value::Int(int) => qb.push_bind(*int),
        Value::Uuid(uuid) => qb.push_bind(*uuid),
        Value::Date(date) => qb.push_bind(*date),
        Value::Timestamp(ts) => qb.push_bind(*ts),
    };
}
