//! `{family.shortcode}`: the family grouping an enrollee belongs to.
//!
//! An enrollee can belong to several families; the interpreter reads the
//! first one the store returns, and the compiled query fans out one row per
//! family the way a join does.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyTerm {
    field: String,
}

impl FamilyTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "family".to_string(),
                field: field.to_string(),
            });
        }
        Ok(FamilyTerm {
            field: field.to_string(),
        })
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let families = store.families_for_enrollee(context.enrollee.id);
        match families.into_iter().next() {
            Some(family) => match self.field.as_str() {
                "shortcode" => SearchValue::String(family.shortcode),
                _ => SearchValue::Absent,
            },
            None => SearchValue::Absent,
        }
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        vec![
            JoinClause::left(
                "family_enrollee",
                "family_enrollee",
                SqlFragment::new("enrollee.id = family_enrollee.enrollee_id"),
            ),
            JoinClause::left(
                "family",
                "family",
                SqlFragment::new("family.id = family_enrollee.family_id"),
            ),
        ]
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("family", "family")]
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("family.{}", to_snake_case(&self.field))
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    BTreeMap::from([(
        "shortcode",
        SearchValueTypeDefinition::of(SearchValueType::String),
    )])
}
