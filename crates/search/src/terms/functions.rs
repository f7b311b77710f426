//! The function catalog: `lower`, `trim`, `min`, `max`.
//!
//! Functions wrap other terms, so SQL requirements (joins, selects, bound
//! parameters) are the concatenation of their arguments' requirements in
//! argument order.

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment, SqlParam};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::SearchTerm;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchFunction {
    Lower(Box<SearchTerm>),
    Trim(Box<SearchTerm>),
    Min(Vec<SearchTerm>),
    Max(Vec<SearchTerm>),
}

impl SearchFunction {
    /// Build a function application, checking arity and argument types.
    pub fn new(name: &str, args: Vec<SearchTerm>) -> Result<Self, ParseError> {
        match name {
            "lower" => {
                let arg = single_string_arg(name, args)?;
                Ok(SearchFunction::Lower(Box::new(arg)))
            }
            "trim" => {
                let arg = single_string_arg(name, args)?;
                Ok(SearchFunction::Trim(Box::new(arg)))
            }
            "min" => Ok(SearchFunction::Min(numeric_args(name, args)?)),
            "max" => Ok(SearchFunction::Max(numeric_args(name, args)?)),
            _ => Err(ParseError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        match self {
            SearchFunction::Lower(arg) => match arg.extract(context, store) {
                SearchValue::String(value) => SearchValue::String(value.to_lowercase()),
                _ => SearchValue::Absent,
            },
            SearchFunction::Trim(arg) => match arg.extract(context, store) {
                SearchValue::String(value) => SearchValue::String(value.trim().to_string()),
                _ => SearchValue::Absent,
            },
            SearchFunction::Min(args) => fold_numbers(args, context, store, f64::min),
            SearchFunction::Max(args) => fold_numbers(args, context, store, f64::max),
        }
    }

    pub(crate) fn term_clause(&self) -> String {
        match self {
            SearchFunction::Lower(arg) => format!("lower({})", arg.term_clause()),
            SearchFunction::Trim(arg) => format!("trim({})", arg.term_clause()),
            SearchFunction::Min(args) => format!("least({})", clause_list(args)),
            SearchFunction::Max(args) => format!("greatest({})", clause_list(args)),
        }
    }

    pub(crate) fn bound_values(&self) -> Vec<SqlParam> {
        self.args().iter().flat_map(|arg| arg.bound_values()).collect()
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        self.args().iter().flat_map(|arg| arg.join_clauses()).collect()
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        self.args()
            .iter()
            .flat_map(|arg| arg.select_clauses())
            .collect()
    }

    pub(crate) fn required_condition(&self) -> Option<SqlFragment> {
        self.args()
            .iter()
            .filter_map(|arg| arg.required_condition())
            .reduce(SqlFragment::and)
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        match self {
            SearchFunction::Lower(_) | SearchFunction::Trim(_) => {
                SearchValueTypeDefinition::of(SearchValueType::String)
            }
            SearchFunction::Min(_) | SearchFunction::Max(_) => {
                SearchValueTypeDefinition::of(SearchValueType::Number)
            }
        }
    }

    pub(crate) fn is_cross_study(&self) -> bool {
        self.args().iter().any(SearchTerm::is_cross_study)
    }

    fn args(&self) -> &[SearchTerm] {
        match self {
            SearchFunction::Lower(arg) | SearchFunction::Trim(arg) => {
                std::slice::from_ref(arg.as_ref())
            }
            SearchFunction::Min(args) | SearchFunction::Max(args) => args,
        }
    }
}

fn single_string_arg(name: &str, mut args: Vec<SearchTerm>) -> Result<SearchTerm, ParseError> {
    if args.len() != 1 {
        return Err(ParseError::FunctionArity {
            name: name.to_string(),
            expected: "exactly one",
            actual: args.len(),
        });
    }
    let arg = args.remove(0);
    check_arg_type(name, &arg, SearchValueType::String)?;
    Ok(arg)
}

fn numeric_args(name: &str, args: Vec<SearchTerm>) -> Result<Vec<SearchTerm>, ParseError> {
    if args.is_empty() {
        return Err(ParseError::FunctionArity {
            name: name.to_string(),
            expected: "at least one",
            actual: 0,
        });
    }
    for arg in &args {
        check_arg_type(name, arg, SearchValueType::Number)?;
    }
    Ok(args)
}

fn check_arg_type(
    name: &str,
    arg: &SearchTerm,
    expected: SearchValueType,
) -> Result<(), ParseError> {
    let actual = arg.value_type().value_type;
    if actual == expected || actual == SearchValueType::Null {
        Ok(())
    } else {
        Err(ParseError::FunctionArgumentType {
            name: name.to_string(),
            actual,
        })
    }
}

fn fold_numbers(
    args: &[SearchTerm],
    context: &EnrolleeSearchContext,
    store: &dyn ParticipantStore,
    pick: fn(f64, f64) -> f64,
) -> SearchValue {
    let mut best: Option<f64> = None;
    for arg in args {
        match arg.extract(context, store) {
            SearchValue::Number(value) => {
                best = Some(best.map_or(value, |current| pick(current, value)));
            }
            // any missing argument poisons the aggregate
            _ => return SearchValue::Absent,
        }
    }
    best.map(SearchValue::Number).unwrap_or(SearchValue::Absent)
}

fn clause_list(args: &[SearchTerm]) -> String {
    args.iter()
        .map(|arg| arg.term_clause())
        .collect::<Vec<_>>()
        .join(", ")
}
