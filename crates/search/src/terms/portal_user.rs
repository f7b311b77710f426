//! `{portalUser.field}`: the enrollee's per-portal registration, reached
//! through the shared profile.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

const ALIAS: &str = "portal_participant_user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalUserTerm {
    field: String,
}

impl PortalUserTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "portalUser".to_string(),
                field: field.to_string(),
            });
        }
        Ok(PortalUserTerm {
            field: field.to_string(),
        })
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let portal_user = match store.find_portal_user(context.enrollee.profile_id) {
            Some(found) => found,
            None => return SearchValue::Absent,
        };
        match self.field.as_str() {
            "createdAt" => SearchValue::Instant(portal_user.created_at),
            "lastLogin" => portal_user
                .last_login
                .map(SearchValue::Instant)
                .unwrap_or(SearchValue::Absent),
            _ => SearchValue::Absent,
        }
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        vec![JoinClause::left(
            "portal_participant_user",
            ALIAS,
            SqlFragment::new(format!("{ALIAS}.profile_id = enrollee.profile_id")),
        )]
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("portal_participant_user", ALIAS)]
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("{}.{}", ALIAS, to_snake_case(&self.field))
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    BTreeMap::from([
        (
            "createdAt",
            SearchValueTypeDefinition::of(SearchValueType::Instant),
        ),
        (
            "lastLogin",
            SearchValueTypeDefinition::of(SearchValueType::Instant),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_on_the_shared_profile() {
        let term = PortalUserTerm::new("lastLogin").unwrap();
        let joins = term.join_clauses();
        assert_eq!(joins.len(), 1);
        assert_eq!(
            joins[0].on.sql,
            "portal_participant_user.profile_id = enrollee.profile_id"
        );
        assert_eq!(term.term_clause(), "portal_participant_user.last_login");
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(PortalUserTerm::new("username").is_err());
    }
}
