//! `{latestKit.field}`: the enrollee's most recently updated kit request.
//!
//! The compiled form joins all kit rows and keeps the latest with a
//! correlated NOT EXISTS, which is also how "latest" is defined for the
//! interpreter: greatest `last_updated_at` wins.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

const ALIAS: &str = "latest_kit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestKitTerm {
    field: String,
}

impl LatestKitTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "latestKit".to_string(),
                field: field.to_string(),
            });
        }
        Ok(LatestKitTerm {
            field: field.to_string(),
        })
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let latest = store
            .kits_for_enrollee(context.enrollee.id)
            .into_iter()
            .max_by_key(|kit| kit.last_updated_at);
        match latest {
            Some(kit) => match self.field.as_str() {
                "status" => SearchValue::String(kit.status.as_str().to_string()),
                _ => SearchValue::Absent,
            },
            None => SearchValue::Absent,
        }
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        vec![JoinClause::left(
            "kit_request",
            ALIAS,
            SqlFragment::new(format!("enrollee.id = {ALIAS}.enrollee_id")),
        )]
    }

    /// The matched kit row comes back with each hit.
    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("kit_request", ALIAS)]
    }

    /// Keeps only the newest kit row: no other kit of the same enrollee may
    /// have a later `last_updated_at`.
    pub(crate) fn required_condition(&self) -> SqlFragment {
        SqlFragment::new(format!(
            "NOT EXISTS (SELECT 1 FROM kit_request other_kit \
             WHERE other_kit.enrollee_id = {ALIAS}.enrollee_id \
             AND other_kit.last_updated_at > {ALIAS}.last_updated_at)"
        ))
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("{}.{}", ALIAS, to_snake_case(&self.field))
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    BTreeMap::from([(
        "status",
        SearchValueTypeDefinition::of(SearchValueType::String),
    )])
}
