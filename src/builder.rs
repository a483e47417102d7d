use serde::Serialize;

use crate::arg::BoundArg;
use crate::results::{ResultDescriptor, ResultPlan};
use crate::types::Value;

/// Clause a conditional fragment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// `where`, joined with `and`.
    WhereAnd,
    /// `where`, joined with `or`.
    WhereOr,
    /// `set`, joined with `,`.
    Set,
}

impl Clause {
    fn keyword(self) -> &'static str {
        match self {
            Clause::WhereAnd | Clause::WhereOr => "where",
            Clause::Set => "set",
        }
    }

    fn connector(self) -> &'static str {
        match self {
            Clause::WhereAnd => "and",
            Clause::WhereOr => "or",
            Clause::Set => ",",
        }
    }

    // Plain text checks on the SQL so far: the keyword anywhere, the connector as a
    // suffix. `somewhere` counts as a `where` and `color` as an open `or`.
    fn has_keyword(self, sql: &str) -> bool {
        sql.to_ascii_lowercase().contains(self.keyword())
    }

    fn is_open(self, sql: &str) -> bool {
        let tail = sql.trim_end().to_ascii_lowercase();
        match self {
            Clause::WhereAnd | Clause::WhereOr => {
                ["where", "and", "or"].iter().any(|word| tail.ends_with(word))
            }
            Clause::Set => tail.ends_with("set") || tail.ends_with(','),
        }
    }
}

/// Accumulates SQL text, bound arguments and result descriptors while a template
/// is rendered.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    args: Vec<BoundArg>,
    results: ResultPlan,
}

impl SqlBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Append one `?` and the argument bound to it.
    pub fn append_placeholder(&mut self, arg: BoundArg) {
        self.sql.push('?');
        self.args.push(arg);
    }

    /// Rendered SQL with trailing whitespace removed.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql.trim_end()
    }

    #[must_use]
    pub fn args(&self) -> &[BoundArg] {
        &self.args
    }

    #[must_use]
    pub fn results(&self) -> &ResultPlan {
        &self.results
    }

    pub fn push_result(&mut self, descriptor: ResultDescriptor) {
        self.results.descriptors.push(descriptor);
    }

    pub fn set_default_result(&mut self, descriptor: ResultDescriptor) {
        self.results.default = Some(descriptor);
    }

    /// True when nothing (not even whitespace) has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.args.is_empty()
    }

    /// Remove `sep` (and the whitespace after it) from the end of the SQL.
    ///
    /// Returns whether anything was removed.
    pub fn retract_trailing(&mut self, sep: &str) -> bool {
        let trimmed_len = self.sql.trim_end().len();
        if self.sql[..trimmed_len].ends_with(sep) {
            self.sql.truncate(trimmed_len - sep.len());
            true
        } else {
            false
        }
    }

    /// Append a rendered fragment to a `where` or `set` clause, inserting the clause
    /// keyword or its connector as the SQL accumulated so far requires.
    pub fn append_clause(&mut self, clause: Clause, fragment: SqlBuilder) {
        let body = fragment.sql.trim();
        if !self.sql.is_empty() && !self.sql.ends_with(char::is_whitespace) {
            self.sql.push(' ');
        }
        if !clause.has_keyword(&self.sql) {
            self.sql.push_str(clause.keyword());
            self.sql.push(' ');
        } else if !clause.is_open(&self.sql) {
            self.sql.push_str(clause.connector());
            self.sql.push(' ');
        }
        self.sql.push_str(body);
        self.args.extend(fragment.args);
        self.absorb_results(fragment.results);
    }

    /// Append everything another builder collected.
    pub fn absorb(&mut self, other: SqlBuilder) {
        self.sql.push_str(&other.sql);
        self.args.extend(other.args);
        self.absorb_results(other.results);
    }

    fn absorb_results(&mut self, results: ResultPlan) {
        self.results.descriptors.extend(results.descriptors);
        if results.default.is_some() {
            self.results.default = results.default;
        }
    }

    #[must_use]
    pub fn into_plan(mut self) -> StatementPlan {
        let trimmed_len = self.sql.trim_end().len();
        self.sql.truncate(trimmed_len);
        StatementPlan {
            sql: self.sql,
            args: self.args,
            results: self.results,
        }
    }
}

/// A compiled statement: SQL, its arguments in placeholder order, and how results
/// are to be read back.
#[derive(Debug, Clone, Serialize)]
pub struct StatementPlan {
    pub sql: String,
    #[serde(serialize_with = "serialize_args")]
    pub args: Vec<BoundArg>,
    pub results: ResultPlan,
}

impl StatementPlan {
    /// Values in placeholder order.
    #[must_use]
    pub fn values(&self) -> Vec<&Value> {
        self.args.iter().map(BoundArg::value).collect()
    }

    /// `a=1, b="x"` rendering used in error messages and logs.
    #[must_use]
    pub fn args_snapshot(&self) -> String {
        self.args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn serialize_args<S>(args: &[BoundArg], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(args.len()))?;
    for arg in args {
        seq.serialize_element(&serde_json::json!({
            "name": arg.name(),
            "expr": arg.expr(),
            "value": arg.value(),
            "mode": arg.mode(),
            "jdbcType": arg.driver_type(),
            "javaType": arg.logical_type().map(ToString::to_string),
            "typeHandler": arg.codec().name(),
        }))?;
    }
    seq.end()
}
