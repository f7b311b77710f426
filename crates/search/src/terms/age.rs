//! `{age}`: the enrollee's age in whole years, derived from the profile
//! birth date.

use chrono::Utc;

use crate::store::EnrolleeSearchContext;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeTerm;

impl AgeTerm {
    pub(crate) fn extract(&self, context: &EnrolleeSearchContext) -> SearchValue {
        let birth_date = match context.profile.as_ref().and_then(|profile| profile.birth_date) {
            Some(date) => date,
            None => return SearchValue::Absent,
        };
        match Utc::now().date_naive().years_since(birth_date) {
            Some(years) => SearchValue::Number(years as f64),
            // birth date in the future
            None => SearchValue::Absent,
        }
    }

    pub(crate) fn term_clause(&self) -> String {
        "date_part('year', age(profile.birth_date))".to_string()
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        type_definition()
    }
}

pub(crate) fn type_definition() -> SearchValueTypeDefinition {
    SearchValueTypeDefinition::of(SearchValueType::Number)
}
