//! Parsed search expressions: in-memory evaluation and SQL compilation.
//!
//! Both consumers walk the same tree, so a rule means the same thing whether
//! it is checked against one enrollee in memory or compiled into the `WHERE`
//! clause of a bulk query. Comparison semantics are aligned with SQL
//! three-valued logic: missing data never satisfies a comparison, except
//! through the explicit `= null` / `!= null` presence tests.

use std::fmt;

use uuid::Uuid;

use crate::error::ParseError;
use crate::sql::{CompiledSearch, EnrolleeSearchQueryBuilder, SqlFragment};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::SearchTerm;
use crate::value::{SearchValue, SearchValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchExpression {
    And(Box<SearchExpression>, Box<SearchExpression>),
    Or(Box<SearchExpression>, Box<SearchExpression>),
    Not(Box<SearchExpression>),
    Comparison {
        left: SearchTerm,
        operator: ComparisonOperator,
        right: SearchTerm,
    },
    /// `include({term})`: matches everyone, but pulls the term's joins and
    /// selects into the compiled query so its rows come back with each hit.
    Include(SearchTerm),
    /// The blank rule: matches every enrollee in the study environment.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanEq,
    LessThanEq,
    Contains,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equals => "=",
            ComparisonOperator::NotEquals => "!=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::GreaterThanEq => ">=",
            ComparisonOperator::LessThanEq => "<=",
            ComparisonOperator::Contains => "contains",
        }
    }

}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl SearchExpression {
    pub fn and(left: SearchExpression, right: SearchExpression) -> SearchExpression {
        SearchExpression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: SearchExpression, right: SearchExpression) -> SearchExpression {
        SearchExpression::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: SearchExpression) -> SearchExpression {
        SearchExpression::Not(Box::new(inner))
    }

    /// Build a comparison, rejecting operand types that can never match.
    ///
    /// Null tests on study-discriminated terms are rejected here: the
    /// compiled query inner-joins the sibling enrollment, so an enrollee
    /// without one can never satisfy `= null` in SQL the way the in-memory
    /// walk would.
    pub fn comparison(
        left: SearchTerm,
        operator: ComparisonOperator,
        right: SearchTerm,
    ) -> Result<SearchExpression, ParseError> {
        if (is_null_literal(&left) && right.is_cross_study())
            || (is_null_literal(&right) && left.is_cross_study())
        {
            return Err(ParseError::CrossStudyNullComparison {
                prefix: "answer".to_string(),
            });
        }
        check_operand_types(&left, operator, &right)?;
        Ok(SearchExpression::Comparison {
            left,
            operator,
            right,
        })
    }

    /// Whether one enrollee satisfies this expression.
    pub fn evaluate(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> bool {
        match self {
            SearchExpression::And(left, right) => {
                left.evaluate(context, store) && right.evaluate(context, store)
            }
            SearchExpression::Or(left, right) => {
                left.evaluate(context, store) || right.evaluate(context, store)
            }
            SearchExpression::Not(inner) => !inner.evaluate(context, store),
            SearchExpression::Comparison {
                left,
                operator,
                right,
            } => evaluate_comparison(left, *operator, right, context, store),
            // mirrors the compiled `IS NOT NULL` presence test
            SearchExpression::Include(term) => !term.extract(context, store).is_absent(),
            SearchExpression::All => true,
        }
    }

    /// Compile into one parameterized query scoped to a study environment.
    pub fn compile(&self, study_environment_id: Uuid) -> CompiledSearch {
        let mut builder = EnrolleeSearchQueryBuilder::new(study_environment_id);
        let predicate = self.where_fragment(&mut builder);
        builder.build(predicate)
    }

    fn where_fragment(&self, builder: &mut EnrolleeSearchQueryBuilder) -> SqlFragment {
        match self {
            SearchExpression::And(left, right) => {
                let left = left.where_fragment(builder);
                let right = right.where_fragment(builder);
                left.and(right)
            }
            SearchExpression::Or(left, right) => {
                let left = left.where_fragment(builder);
                let right = right.where_fragment(builder);
                left.or(right)
            }
            SearchExpression::Not(inner) => {
                let inner = inner.where_fragment(builder);
                SqlFragment::with_params(format!("NOT ({})", inner.sql), inner.params)
            }
            SearchExpression::Comparison {
                left,
                operator,
                right,
            } => compile_comparison(left, *operator, right, builder),
            SearchExpression::Include(term) => {
                register_term(term, builder);
                let presence = SqlFragment::with_params(
                    format!("{} IS NOT NULL", term.term_clause()),
                    term.bound_values(),
                );
                match term.required_condition() {
                    Some(condition) => condition.and(presence),
                    None => presence,
                }
            }
            SearchExpression::All => SqlFragment::new("1 = 1"),
        }
    }
}

fn is_null_literal(term: &SearchTerm) -> bool {
    matches!(term, SearchTerm::Value(SearchValue::Absent))
}

fn check_operand_types(
    left: &SearchTerm,
    operator: ComparisonOperator,
    right: &SearchTerm,
) -> Result<(), ParseError> {
    let left_type = left.value_type().value_type;
    let right_type = right.value_type().value_type;
    if left_type == SearchValueType::Null || right_type == SearchValueType::Null {
        return Ok(());
    }
    let compatible = match operator {
        ComparisonOperator::Contains => {
            left_type == SearchValueType::String && right_type == SearchValueType::String
        }
        ComparisonOperator::Equals | ComparisonOperator::NotEquals => {
            left_type == right_type || temporal_string_pair(left_type, right_type)
        }
        _ => {
            (left_type == right_type
                && matches!(
                    left_type,
                    SearchValueType::Number | SearchValueType::Instant | SearchValueType::Date
                ))
                || temporal_string_pair(left_type, right_type)
        }
    };
    if compatible {
        Ok(())
    } else {
        Err(ParseError::TypeMismatch {
            operator: operator.to_string(),
            left: left_type,
            right: right_type,
        })
    }
}

fn temporal_string_pair(left: SearchValueType, right: SearchValueType) -> bool {
    (left.is_temporal() && right == SearchValueType::String)
        || (left == SearchValueType::String && right.is_temporal())
}

fn evaluate_comparison(
    left: &SearchTerm,
    operator: ComparisonOperator,
    right: &SearchTerm,
    context: &EnrolleeSearchContext,
    store: &dyn ParticipantStore,
) -> bool {
    let mut left_value = left.extract(context, store);
    let mut right_value = right.extract(context, store);

    // `= null` / `!= null` are presence tests, the one place Absent matches.
    if is_null_literal(left) || is_null_literal(right) {
        return match operator {
            ComparisonOperator::Equals => left_value.equals(&right_value),
            ComparisonOperator::NotEquals => !left_value.equals(&right_value),
            _ => false,
        };
    }
    if left_value.is_absent() || right_value.is_absent() {
        return false;
    }

    // let quoted literals compare against date and timestamp terms
    if left_value.value_type().is_temporal() {
        right_value = right_value.parse_to(left_value.value_type());
    } else if right_value.value_type().is_temporal() {
        left_value = left_value.parse_to(right_value.value_type());
    }

    match operator {
        ComparisonOperator::Equals => left_value.equals(&right_value),
        ComparisonOperator::NotEquals => {
            // a failed temporal coercion leaves an Absent side; no match
            if left_value.is_absent() || right_value.is_absent() {
                false
            } else {
                !left_value.equals(&right_value)
            }
        }
        ComparisonOperator::GreaterThan => left_value.greater_than(&right_value),
        ComparisonOperator::LessThan => right_value.greater_than(&left_value),
        ComparisonOperator::GreaterThanEq => left_value.greater_than_or_equal(&right_value),
        ComparisonOperator::LessThanEq => right_value.greater_than_or_equal(&left_value),
        ComparisonOperator::Contains => left_value.contains(&right_value),
    }
}

fn register_term(term: &SearchTerm, builder: &mut EnrolleeSearchQueryBuilder) {
    for join in term.join_clauses() {
        builder.add_join(join);
    }
    for select in term.select_clauses() {
        builder.add_select(select);
    }
}

fn compile_comparison(
    left: &SearchTerm,
    operator: ComparisonOperator,
    right: &SearchTerm,
    builder: &mut EnrolleeSearchQueryBuilder,
) -> SqlFragment {
    register_term(left, builder);
    register_term(right, builder);

    let mut fragment = comparison_fragment(left, operator, right);
    if let Some(condition) = right.required_condition() {
        fragment = condition.and(fragment);
    }
    if let Some(condition) = left.required_condition() {
        fragment = condition.and(fragment);
    }
    fragment
}

fn comparison_fragment(
    left: &SearchTerm,
    operator: ComparisonOperator,
    right: &SearchTerm,
) -> SqlFragment {
    // null-literal comparisons become IS NULL / IS NOT NULL presence tests
    if is_null_literal(left) || is_null_literal(right) {
        if is_null_literal(left) && is_null_literal(right) {
            return match operator {
                ComparisonOperator::Equals => SqlFragment::new("1 = 1"),
                _ => SqlFragment::new("1 = 0"),
            };
        }
        let tested = if is_null_literal(left) { right } else { left };
        return match operator {
            ComparisonOperator::Equals => SqlFragment::with_params(
                format!("{} IS NULL", tested.term_clause()),
                tested.bound_values(),
            ),
            ComparisonOperator::NotEquals => SqlFragment::with_params(
                format!("{} IS NOT NULL", tested.term_clause()),
                tested.bound_values(),
            ),
            _ => SqlFragment::new("1 = 0"),
        };
    }

    let left_type = left.value_type().value_type;
    let right_type = right.value_type().value_type;
    let left_clause = term_clause_with_cast(left, left_type, right_type);
    let right_clause = term_clause_with_cast(right, right_type, left_type);

    let sql = match operator {
        ComparisonOperator::Contains => {
            format!("{left_clause} ILIKE concat('%', {right_clause}, '%')")
        }
        _ => format!("{} {} {}", left_clause, operator.symbol(), right_clause),
    };

    let mut params = left.bound_values();
    params.extend(right.bound_values());
    SqlFragment::with_params(sql, params)
}

/// A string operand compared against a temporal one is cast so Postgres
/// compares timestamps, not text.
fn term_clause_with_cast(
    term: &SearchTerm,
    own_type: SearchValueType,
    other_type: SearchValueType,
) -> String {
    let clause = term.term_clause();
    if own_type == SearchValueType::String && other_type.is_temporal() {
        let cast = match other_type {
            SearchValueType::Instant => "timestamp",
            _ => "date",
        };
        format!("{clause}::{cast}")
    } else {
        clause
    }
}
