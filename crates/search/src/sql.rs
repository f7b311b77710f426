//! SQL assembly for compiled enrollee searches.
//!
//! A compiled search is one parameterized `SELECT` rooted at the `enrollee`
//! table with `profile` inner-joined, plus whatever joins the rule's terms
//! require. [`SqlFragment`] keeps SQL text and its bound parameters in
//! lock-step so positional `?` placeholders always line up, and
//! [`EnrolleeSearchQueryBuilder`] deduplicates joins and selects by alias so
//! a term referenced twice contributes its tables once.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::value::SearchValue;

/// A typed bound parameter for a positional `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    String(String),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Null,
}

impl SqlParam {
    pub fn string(value: impl Into<String>) -> Self {
        SqlParam::String(value.into())
    }
}

impl From<&SearchValue> for SqlParam {
    fn from(value: &SearchValue) -> Self {
        match value {
            SearchValue::String(s) => SqlParam::String(s.clone()),
            SearchValue::Number(n) => SqlParam::Number(*n),
            SearchValue::Boolean(b) => SqlParam::Boolean(*b),
            SearchValue::Instant(t) => SqlParam::Timestamp(*t),
            SearchValue::Date(d) => SqlParam::Date(*d),
            SearchValue::Absent => SqlParam::Null,
        }
    }
}

/// A piece of SQL together with the parameters its placeholders bind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        SqlFragment {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        SqlFragment {
            sql: sql.into(),
            params,
        }
    }

    /// Combine two fragments with AND, parenthesizing both sides.
    pub fn and(self, other: SqlFragment) -> SqlFragment {
        self.combine(other, "AND")
    }

    /// Combine two fragments with OR, parenthesizing both sides.
    pub fn or(self, other: SqlFragment) -> SqlFragment {
        self.combine(other, "OR")
    }

    fn combine(self, other: SqlFragment, op: &str) -> SqlFragment {
        if self.sql.is_empty() {
            return other;
        }
        if other.sql.is_empty() {
            return self;
        }
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment {
            sql: format!("({}) {} ({})", self.sql, op, other.sql),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// One join a term requires, keyed by alias for deduplication. The ON
/// condition is a fragment so discriminating filters (survey stable ids,
/// task targets) ride along as bound parameters instead of being inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub on: SqlFragment,
}

impl JoinClause {
    pub fn inner(table: impl Into<String>, alias: impl Into<String>, on: SqlFragment) -> Self {
        JoinClause {
            join_type: JoinType::Inner,
            table: table.into(),
            alias: alias.into(),
            on,
        }
    }

    pub fn left(table: impl Into<String>, alias: impl Into<String>, on: SqlFragment) -> Self {
        JoinClause {
            join_type: JoinType::Left,
            table: table.into(),
            alias: alias.into(),
            on,
        }
    }

    fn to_sql(&self) -> String {
        format!(
            "{} {} {} ON {}",
            self.join_type.as_sql(),
            self.table,
            self.alias,
            self.on.sql
        )
    }
}

/// An extra table whose columns a query returns, so callers can attach the
/// joined rows (families, users, tasks) to each result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    pub table: String,
    pub alias: String,
}

impl SelectClause {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        SelectClause {
            table: table.into(),
            alias: alias.into(),
        }
    }
}

/// The finished query: SQL text, parameters in placeholder order, and the
/// selected auxiliary tables for result attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub selects: Vec<SelectClause>,
}

/// Accumulates the joins and selects a rule's terms require, then renders the
/// final statement around the WHERE predicate.
#[derive(Debug)]
pub struct EnrolleeSearchQueryBuilder {
    study_environment_id: Uuid,
    joins: Vec<JoinClause>,
    selects: Vec<SelectClause>,
}

impl EnrolleeSearchQueryBuilder {
    pub fn new(study_environment_id: Uuid) -> Self {
        EnrolleeSearchQueryBuilder {
            study_environment_id,
            joins: Vec::new(),
            selects: Vec::new(),
        }
    }

    /// Add a join unless one with the same alias is already present.
    pub fn add_join(&mut self, join: JoinClause) {
        if !self.joins.iter().any(|existing| existing.alias == join.alias) {
            self.joins.push(join);
        }
    }

    /// Add a select unless the alias is already selected.
    pub fn add_select(&mut self, select: SelectClause) {
        if !self
            .selects
            .iter()
            .any(|existing| existing.alias == select.alias)
        {
            self.selects.push(select);
        }
    }

    /// Render the statement. Parameter order matches placeholder order: join
    /// ON parameters first (joins render before the WHERE clause), then the
    /// study environment scope, then the predicate's parameters.
    pub fn build(self, predicate: SqlFragment) -> CompiledSearch {
        let mut sql = String::from("SELECT enrollee.*, profile.*");
        for select in &self.selects {
            sql.push_str(&format!(", {}.*", select.alias));
        }
        sql.push_str(
            " FROM enrollee enrollee INNER JOIN profile profile ON profile.id = enrollee.profile_id",
        );

        let mut params = Vec::new();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
            params.extend(join.on.params.iter().cloned());
        }

        sql.push_str(&format!(
            " WHERE enrollee.study_environment_id = ? AND ({})",
            predicate.sql
        ));
        params.push(SqlParam::Uuid(self.study_environment_id));
        params.extend(predicate.params);

        CompiledSearch {
            sql,
            params,
            selects: self.selects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_combine_with_parens_and_merged_params() {
        let left = SqlFragment::with_params("a = ?", vec![SqlParam::string("1")]);
        let right = SqlFragment::with_params("b = ?", vec![SqlParam::string("2")]);
        let combined = left.and(right);
        assert_eq!(combined.sql, "(a = ?) AND (b = ?)");
        assert_eq!(
            combined.params,
            vec![SqlParam::string("1"), SqlParam::string("2")]
        );
    }

    #[test]
    fn empty_fragment_is_identity_for_combine() {
        let frag = SqlFragment::with_params("a = ?", vec![SqlParam::string("1")]);
        assert_eq!(SqlFragment::default().or(frag.clone()), frag);
        assert_eq!(frag.clone().and(SqlFragment::default()), frag);
    }

    #[test]
    fn builder_dedupes_joins_and_selects_by_alias() {
        let mut builder = EnrolleeSearchQueryBuilder::new(Uuid::nil());
        let join = JoinClause::left(
            "answer",
            "answer_q1",
            SqlFragment::new("enrollee.id = answer_q1.enrollee_id"),
        );
        builder.add_join(join.clone());
        builder.add_join(join);
        builder.add_select(SelectClause::new("family", "family"));
        builder.add_select(SelectClause::new("family", "family"));

        let compiled = builder.build(SqlFragment::new("1 = 1"));
        assert_eq!(compiled.sql.matches("LEFT JOIN answer").count(), 1);
        assert_eq!(compiled.sql.matches("family.*").count(), 1);
    }

    #[test]
    fn build_orders_join_params_before_scope_and_predicate() {
        let mut builder = EnrolleeSearchQueryBuilder::new(Uuid::nil());
        builder.add_join(JoinClause::left(
            "participant_task",
            "task_t1",
            SqlFragment::with_params(
                "enrollee.id = task_t1.enrollee_id AND task_t1.target_stable_id = ?",
                vec![SqlParam::string("t1")],
            ),
        ));
        let compiled = builder.build(SqlFragment::with_params(
            "task_t1.status = ?",
            vec![SqlParam::string("COMPLETE")],
        ));

        assert_eq!(
            compiled.params,
            vec![
                SqlParam::string("t1"),
                SqlParam::Uuid(Uuid::nil()),
                SqlParam::string("COMPLETE"),
            ]
        );
        assert!(compiled.sql.starts_with("SELECT enrollee.*, profile.* FROM enrollee enrollee"));
        assert!(compiled.sql.ends_with("WHERE enrollee.study_environment_id = ? AND (task_t1.status = ?)"));
    }
}
